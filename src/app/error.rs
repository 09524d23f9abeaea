use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use serde_derive::Serialize;

use crate::app::auth::ResolveError;
use crate::error::Error;

quick_error! {
	/// Everything that can go wrong while serving a proxied request.
	#[derive(Debug)]
	pub enum AppError {
		/// Query could not be parsed, or could not be confined to the caller's scope.
		Query(err: Error) {
			from()
			display("{}", err)
			source(err)
		}
		BadRequest(reason: String) {
			display("{}", reason)
		}
		UnsupportedBody(reason: String) {
			display("unsupported body: {}", reason)
		}
		Unauthorized(reason: String) {
			display("unauthorized: {}", reason)
		}
		Denied(reason: String) {
			display("forbidden: {}", reason)
		}
		Unavailable(reason: String) {
			display("unavailable: {}", reason)
		}
		Timeout(reason: String) {
			display("timed out: {}", reason)
		}
		Config(reason: String) {
			display("invalid configuration: {}", reason)
		}
		Internal(reason: String) {
			display("{}", reason)
		}
	}
}

impl From<ResolveError> for AppError {
	fn from(err: ResolveError) -> Self {
		match err {
			ResolveError::Denied(reason) => AppError::Denied(reason),
			ResolveError::Unavailable(reason) => AppError::Unavailable(format!("identity service: {reason}")),
			ResolveError::Timeout => AppError::Timeout("identity service".into()),
		}
	}
}

impl From<reqwest::Error> for AppError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			AppError::Timeout(format!("backend: {err}"))
		} else {
			AppError::Unavailable(format!("backend: {err}"))
		}
	}
}

impl AppError {
	pub fn status(&self) -> (StatusCode, &'static str) {
		match self {
			AppError::Query(Error::Scope(_)) => (StatusCode::FORBIDDEN, "forbidden"),
			AppError::Query(_) | AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_data"),
			AppError::UnsupportedBody(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "bad_data"),
			AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
			AppError::Denied(_) => (StatusCode::FORBIDDEN, "forbidden"),
			AppError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "unavailable"),
			AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
			AppError::Config(_) | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let (status, error_type) = self.status();
		let body = ErrorResponse {
			status: "error",
			error_type,
			error: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}

/// Same shape as errors returned by the Prometheus HTTP API itself.
#[derive(Serialize)]
struct ErrorResponse<'a> {
	status: &'a str,
	#[serde(rename = "errorType")]
	error_type: &'a str,
	error: String,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{parse_and_scope, ParserOptions, Scope};

	fn query_error(text: &str) -> AppError {
		let scope = Scope::new().with("cluster", "prod").unwrap();
		AppError::from(parse_and_scope(text, &scope, ParserOptions::default()).unwrap_err())
	}

	#[test]
	fn status_mapping() {
		assert_eq!(query_error("up{").status(), (StatusCode::BAD_REQUEST, "bad_data"));
		assert_eq!(query_error("up{job='").status(), (StatusCode::BAD_REQUEST, "bad_data"));
		assert_eq!(query_error("up{cluster='dev'}").status(), (StatusCode::FORBIDDEN, "forbidden"));
		assert_eq!(AppError::from(ResolveError::Timeout).status().0, StatusCode::GATEWAY_TIMEOUT);
		assert_eq!(
			AppError::from(ResolveError::Unavailable("refused".into())).status().0,
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(AppError::Unauthorized("x".into()).status().0, StatusCode::UNAUTHORIZED);
		assert_eq!(
			AppError::UnsupportedBody("multipart".into()).status(),
			(StatusCode::UNSUPPORTED_MEDIA_TYPE, "bad_data")
		);
	}

	#[test]
	fn messages() {
		assert_eq!(
			query_error("up{cluster='dev'}").to_string(),
			"scope violation: matcher cluster=\"dev\" conflicts with the required cluster=\"prod\""
		);
		assert_eq!(
			AppError::from(ResolveError::Denied("unknown token".into())).to_string(),
			"forbidden: unknown token"
		);
	}
}
