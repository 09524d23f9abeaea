use std::{sync::Arc, time::Duration};

use log::info;
use reqwest::{Client, redirect::Policy};
use url::Url;

use crate::scope::Scope;
use crate::ParserOptions;

use super::auth::{Credentials, Identity, ResolveError, ScopeResolver};
use super::error::AppError;

pub struct AppConfig {
	/// Prometheus-compatible server that receives the rewritten requests; its path is prepended to every request path.
	pub backend_url: Url,
	/// Applies to identity lookups and backend requests separately.
	pub timeout: Duration,
	/// Cookies that may carry the access token, in order of preference.
	pub cookie_names: Vec<String>,
	/// Constraints applied on top of every caller's own scope, e.g. the cluster this proxy fronts.
	pub base_scope: Scope,
	pub parser: ParserOptions,
}

#[derive(Clone)]
pub struct AppState {
	client: Client,
	config: Arc<AppConfig>,
	resolver: Arc<dyn ScopeResolver>,
}

impl AppState {
	pub fn new(config: AppConfig, resolver: Arc<dyn ScopeResolver>) -> Result<Self, AppError> {
		// redirects are relayed to the caller rather than followed with its credentials
		let client = Client::builder()
			.timeout(config.timeout)
			.redirect(Policy::none())
			.build()
			.map_err(|err| AppError::Config(format!("failed to build backend client: {err}")))?;
		info!(
			"proxying to {} (timeout={:?}, base scope={:?})",
			config.backend_url,
			config.timeout,
			config.base_scope.constraints()
		);
		Ok(Self {
			client,
			config: Arc::new(config),
			resolver,
		})
	}

	pub fn client(&self) -> &Client {
		&self.client
	}

	pub fn config(&self) -> &AppConfig {
		&self.config
	}

	/// Resolves the caller and merges their scope with the base scope.
	pub async fn identify(&self, credentials: &Credentials) -> Result<Identity, AppError> {
		let identity = tokio::time::timeout(self.config.timeout, self.resolver.resolve(credentials))
			.await
			.map_err(|_| ResolveError::Timeout)??;

		let base = self.config.base_scope.constraints().iter();
		let own = identity.scope.constraints().iter();
		let scope = Scope::from_pairs(base.chain(own).map(|c| (c.label.as_str(), c.value.as_str())))
			.map_err(|err| AppError::Denied(format!("{} is not allowed here: {err}", identity.subject)))?;
		Ok(Identity {
			subject: identity.subject,
			scope,
		})
	}

	/// Backend location for a request to `path?query`.
	pub fn backend_url(&self, path: &str, query: Option<&str>) -> Url {
		let mut url = self.config.backend_url.clone();
		let base = url.path().trim_end_matches('/');
		let joined = format!("{base}{path}");
		url.set_path(&joined);
		url.set_query(query.filter(|q| !q.is_empty()));
		url
	}
}
