use std::time::Instant;

use axum::{
	Router,
	body::{Body, to_bytes},
	extract::State,
	http::{
		HeaderMap,
		HeaderName,
		HeaderValue,
		Method,
		Request,
		header::{CONTENT_LENGTH, CONTENT_TYPE, HOST},
	},
	middleware::{self, Next},
	response::Response,
	routing::get,
};
use log::{debug, warn};

use crate::error::Error;

use super::{
	auth::{Credentials, Identity},
	error::AppError,
	rewrite::{restrict_label_metadata, rewrite_params, Endpoint, Rewritten},
	state::AppState,
};

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const SERVICE_VERSION: &str = concat!("promql-scope/", env!("CARGO_PKG_VERSION"));

/// Connection-level headers that must not be forwarded by a proxy.
const HOP_BY_HOP: &[&str] = &[
	"connection",
	"keep-alive",
	"proxy-connection",
	"transfer-encoding",
	"te",
	"trailer",
	"upgrade",
];

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/v1/ping", get(ping))
		.fallback(proxy)
		.with_state(state)
		.layer(middleware::from_fn(log_requests))
		.layer(middleware::from_fn(add_version))
}

async fn ping() -> &'static str {
	"Pong"
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
	HOP_BY_HOP.contains(&name.as_str())
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
	let mut out = HeaderMap::with_capacity(headers.len());
	for (name, value) in headers {
		// the body may be re-encoded and the host is the backend's
		if is_hop_by_hop(name) || name == HOST || name == CONTENT_LENGTH {
			continue;
		}
		out.append(name.clone(), value.clone());
	}
	out
}

fn is_form(headers: &HeaderMap) -> bool {
	headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
}

fn confine(encoded: &str, state: &AppState, identity: &Identity) -> Result<Rewritten, AppError> {
	rewrite_params(encoded, &identity.scope, state.config().parser).map_err(|err| {
		if let Error::Scope(violation) = &err {
			warn!(
				target: "audit",
				"rejected query from {}: {} (scope {:?})",
				identity.subject,
				violation,
				identity.scope.constraints()
			);
		}
		AppError::from(err)
	})
}

async fn proxy(State(state): State<AppState>, req: Request<Body>) -> Result<Response, AppError> {
	let (parts, body) = req.into_parts();
	let path = parts.uri.path().to_string();

	let credentials = Credentials::from_headers(&parts.headers, &state.config().cookie_names)
		.ok_or_else(|| AppError::Unauthorized("no access token".into()))?;
	let identity = state.identify(&credentials).await?;

	let endpoint = Endpoint::of(&path);
	if endpoint == Endpoint::Unscoped && !identity.scope.is_empty() {
		return Err(AppError::Denied(format!("{path} is only available to unrestricted users")));
	}

	let body = to_bytes(body, MAX_BODY_BYTES)
		.await
		.map_err(|err| AppError::BadRequest(format!("failed to read request body: {err}")))?;

	let mut query = parts.uri.query().map(str::to_string);
	let mut body = body.to_vec();

	if endpoint != Endpoint::Unscoped {
		let mut url_params = confine(query.as_deref().unwrap_or(""), &state, &identity)?;
		let mut scoped = url_params.scoped;

		if !body.is_empty() {
			// anything but a form, multipart included, could carry a query past the rewrite
			if !is_form(&parts.headers) {
				return Err(AppError::UnsupportedBody(format!("{path} only accepts {FORM_CONTENT_TYPE} bodies")));
			}
			let text = std::str::from_utf8(&body)
				.map_err(|_| AppError::BadRequest("form body is not valid UTF-8".into()))?;
			let form = confine(text, &state, &identity)?;
			scoped += form.scoped;
			body = form.encoded.into_bytes();
		}

		if endpoint == Endpoint::LabelMetadata && scoped == 0 {
			restrict_label_metadata(&mut url_params, &identity.scope);
		}
		query = Some(url_params.encoded);
	}

	let url = state.backend_url(&path, query.as_deref());
	debug!("forwarding {} {} for {}", parts.method, url, identity.subject);

	let mut outbound = state
		.client()
		.request(parts.method.clone(), url)
		.headers(forwarded_headers(&parts.headers));
	if !body.is_empty() {
		outbound = outbound.body(body);
	}
	let upstream = tokio::time::timeout(state.config().timeout, outbound.send())
		.await
		.map_err(|_| AppError::Timeout("backend".into()))??;

	let mut response = Response::builder().status(upstream.status());
	if let Some(headers) = response.headers_mut() {
		for (name, value) in upstream.headers() {
			if !is_hop_by_hop(name) {
				headers.append(name.clone(), value.clone());
			}
		}
	}
	let body = if parts.method == Method::HEAD {
		Body::empty()
	} else {
		Body::from_stream(upstream.bytes_stream())
	};
	response
		.body(body)
		.map_err(|err| AppError::Internal(format!("failed to relay backend response: {err}")))
}

async fn add_version(req: Request<Body>, next: Next) -> Response {
	let mut response = next.run(req).await;
	response
		.headers_mut()
		.insert("x-service-version", HeaderValue::from_static(SERVICE_VERSION));
	response
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
	let method = req.method().clone();
	let uri = req.uri().clone();
	let start = Instant::now();
	let response = next.run(req).await;
	let status = response.status();
	let elapsed = start.elapsed();
	log::info!(
		"method={} path={} status={} duration_ms={:.3}",
		method,
		uri.path(),
		status.as_u16(),
		elapsed.as_secs_f64() * 1000.0
	);
	response
}
