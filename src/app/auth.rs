use std::{collections::HashMap, path::Path, time::Duration};

use async_trait::async_trait;
use axum::http::{
	HeaderMap,
	StatusCode,
	header::{AUTHORIZATION, COOKIE},
};
use log::{debug, info};
use serde_derive::Deserialize;
use url::Url;

use crate::app::error::AppError;
use crate::scope::Scope;

/// Access token presented by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
	pub token: String,
}

impl Credentials {
	/// Takes the `Authorization: Bearer …` token or, failing that, the first of `cookie_names` that is set.
	pub fn from_headers(headers: &HeaderMap, cookie_names: &[String]) -> Option<Credentials> {
		let bearer = headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| {
				let (scheme, token) = value.trim().split_once(' ')?;
				scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
			})
			.filter(|token| !token.is_empty());
		if let Some(token) = bearer {
			return Some(Credentials { token: token.to_string() });
		}

		let cookies: Vec<(&str, &str)> = headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|value| value.to_str().ok())
			.flat_map(|value| value.split(';'))
			.filter_map(|pair| pair.trim().split_once('='))
			.collect();
		cookie_names.iter().find_map(|name| {
			cookies
				.iter()
				.find(|(cookie, token)| cookie == name && !token.is_empty())
				.map(|(_, token)| Credentials { token: token.to_string() })
		})
	}
}

/// Who the caller is, and which part of the metrics they may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
	pub subject: String,
	pub scope: Scope,
}

quick_error! {
	#[derive(Debug, Clone, PartialEq)]
	pub enum ResolveError {
		/// Credentials are not valid, or grant no access to metrics.
		Denied(reason: String) {
			display("access denied: {}", reason)
		}
		Unavailable(reason: String) {
			display("{}", reason)
		}
		Timeout {
			display("timed out")
		}
	}
}

/// Maps credentials to the identity they belong to.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
	async fn resolve(&self, credentials: &Credentials) -> Result<Identity, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct ScopeEntry {
	label: String,
	value: String,
}

fn scope_of(entries: Vec<ScopeEntry>) -> Result<Scope, crate::scope::ScopeError> {
	Scope::from_pairs(entries.into_iter().map(|e| (e.label, e.value)))
}

#[derive(Debug, Deserialize)]
struct TenantEntry {
	token: String,
	subject: String,
	#[serde(default)]
	scope: Vec<ScopeEntry>,
}

#[derive(Debug, Deserialize)]
struct TenantFile {
	#[serde(default)]
	tenants: Vec<TenantEntry>,
}

/**
Fixed token table, loaded from TOML:

```toml
[[tenants]]
token = "s3cr3t"
subject = "team-a"
scope = [{ label = "namespace", value = "team-a" }]
```

A tenant with an empty scope can read everything.
*/
pub struct StaticScopeResolver {
	tenants: HashMap<String, Identity>,
}

impl StaticScopeResolver {
	pub fn from_toml(text: &str) -> Result<Self, AppError> {
		let file: TenantFile =
			toml::from_str(text).map_err(|err| AppError::Config(format!("failed to parse tenant table: {err}")))?;

		let mut tenants = HashMap::with_capacity(file.tenants.len());
		for tenant in file.tenants {
			let scope = scope_of(tenant.scope)
				.map_err(|err| AppError::Config(format!("tenant {}: {err}", tenant.subject)))?;
			let identity = Identity {
				subject: tenant.subject,
				scope,
			};
			if tenants.insert(tenant.token, identity).is_some() {
				return Err(AppError::Config("the same token is listed for more than one tenant".into()));
			}
		}
		Ok(Self { tenants })
	}

	pub fn load(path: &Path) -> Result<Self, AppError> {
		let text = std::fs::read_to_string(path)
			.map_err(|err| AppError::Config(format!("failed to read {}: {err}", path.display())))?;
		let resolver = Self::from_toml(&text)?;
		info!("loaded {} tenants from {}", resolver.tenants.len(), path.display());
		Ok(resolver)
	}
}

#[async_trait]
impl ScopeResolver for StaticScopeResolver {
	async fn resolve(&self, credentials: &Credentials) -> Result<Identity, ResolveError> {
		self.tenants
			.get(&credentials.token)
			.cloned()
			.ok_or_else(|| ResolveError::Denied("unknown token".into()))
	}
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
	subject: String,
	#[serde(default)]
	scope: Vec<ScopeEntry>,
}

/// Asks a remote identity service: `GET <url>` with the caller's bearer token, answered with `{"subject": …, "scope": [{"label": …, "value": …}]}`.
pub struct HttpScopeResolver {
	client: reqwest::Client,
	url: Url,
}

impl HttpScopeResolver {
	pub fn new(url: Url, timeout: Duration) -> Result<Self, AppError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|err| AppError::Config(format!("failed to build identity client: {err}")))?;
		Ok(Self { client, url })
	}
}

#[async_trait]
impl ScopeResolver for HttpScopeResolver {
	async fn resolve(&self, credentials: &Credentials) -> Result<Identity, ResolveError> {
		let response = self
			.client
			.get(self.url.clone())
			.bearer_auth(&credentials.token)
			.send()
			.await
			.map_err(|err| {
				if err.is_timeout() {
					ResolveError::Timeout
				} else {
					ResolveError::Unavailable(err.to_string())
				}
			})?;

		let status = response.status();
		if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
			return Err(ResolveError::Denied(format!("identity service answered {status}")));
		}
		if !status.is_success() {
			return Err(ResolveError::Unavailable(format!("identity service answered {status}")));
		}

		let body: IdentityResponse = response
			.json()
			.await
			.map_err(|err| ResolveError::Unavailable(format!("malformed identity response: {err}")))?;
		// an inconsistent answer is not something to guess at
		let scope = scope_of(body.scope)
			.map_err(|err| ResolveError::Unavailable(format!("malformed identity response: {err}")))?;
		debug!("resolved {} to scope {:?}", body.subject, scope.constraints());
		Ok(Identity {
			subject: body.subject,
			scope,
		})
	}
}
