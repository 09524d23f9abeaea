use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use log::{LevelFilter, info};
use url::Url;

use promql_scope::app::{
	AppConfig,
	AppError,
	AppState,
	HttpScopeResolver,
	ScopeResolver,
	StaticScopeResolver,
	router,
};
use promql_scope::{ParserOptions, Scope};

#[derive(Debug, Parser)]
#[command(author, version, about, disable_help_subcommand = true)]
struct Args {
	/// HTTP bind address for the proxy
	#[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
	bind: SocketAddr,
	/// Prometheus-compatible server receiving the rewritten queries, e.g. http://prometheus:9090
	#[arg(long = "backend-url", env = "PROMETHEUS_URL")]
	backend_url: Url,
	/// Timeout for identity lookups and backend requests, in seconds
	#[arg(long = "timeout-secs", env = "PROXY_TIMEOUT_SECS", default_value_t = 60)]
	timeout_secs: u64,
	/// Cookies that may carry the access token, tried in order
	#[arg(long = "cookie-names", env = "NP_AUTH_ACCESS_TOKEN_COOKIE_NAMES", value_delimiter = ',')]
	cookie_names: Vec<String>,
	/// Cluster this proxy fronts; pins every query to it
	#[arg(long = "cluster-name", env = "NP_CLUSTER_NAME")]
	cluster_name: Option<String>,
	/// Label holding the cluster name
	#[arg(long = "cluster-label", env = "NP_CLUSTER_LABEL", default_value = "cluster")]
	cluster_label: String,
	/// TOML table of tokens and their scopes
	#[arg(long = "scope-file", env = "SCOPE_FILE", conflicts_with = "auth_url", required_unless_present = "auth_url")]
	scope_file: Option<PathBuf>,
	/// Identity service resolving bearer tokens into scopes
	#[arg(long = "auth-url", env = "AUTH_URL")]
	auth_url: Option<Url>,
	/// Accept `#` comments in queries
	#[arg(long)]
	comments: bool,
	/// Accept periods in metric names
	#[arg(long = "allow-periods")]
	allow_periods: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
	init_logging();
	let args = Args::parse();
	info!("starting promql-scope-proxy (backend={}, bind={})", args.backend_url, args.bind);

	let timeout = Duration::from_secs(args.timeout_secs);
	let resolver: Arc<dyn ScopeResolver> = match (&args.scope_file, &args.auth_url) {
		(Some(path), _) => Arc::new(StaticScopeResolver::load(path)?),
		(None, Some(url)) => {
			info!("resolving identities with {}", url);
			Arc::new(HttpScopeResolver::new(url.clone(), timeout)?)
		}
		(None, None) => return Err(AppError::Config("either --scope-file or --auth-url is required".into())),
	};

	let base_scope = match args.cluster_name {
		Some(name) => Scope::new()
			.with(args.cluster_label, name)
			.map_err(|err| AppError::Config(err.to_string()))?,
		None => Scope::new(),
	};
	let config = AppConfig {
		backend_url: args.backend_url,
		timeout,
		cookie_names: args.cookie_names,
		base_scope,
		parser: ParserOptions::new()
			.comments(args.comments)
			.allow_periods(args.allow_periods)
			.build(),
	};
	let app = router(AppState::new(config, resolver)?);

	info!("binding TCP listener on {}", args.bind);
	let listener = tokio::net::TcpListener::bind(args.bind)
		.await
		.map_err(|err| AppError::Internal(format!("failed to bind listener: {err}")))?;
	info!("promql-scope-proxy listening on {}", args.bind);
	axum::serve(listener, app)
		.await
		.map_err(|err| AppError::Internal(format!("server error: {err}")))?;
	Ok(())
}

fn init_logging() {
	if std::env::var_os("RUST_LOG").is_some() {
		env_logger::Builder::from_default_env().init();
	} else {
		env_logger::Builder::new()
			.filter_level(LevelFilter::Warn)
			.filter_module("promql_scope", LevelFilter::Info)
			.filter_module("promql_scope_proxy", LevelFilter::Info)
			.init();
	}
}
