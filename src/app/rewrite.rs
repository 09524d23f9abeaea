use log::debug;
use url::form_urlencoded;

use crate::error::Error;
use crate::scope::Scope;
use crate::{parse_and_scope, ParserOptions};

/// Parameters holding queries or series selectors.
const QUERY_PARAMS: &[&str] = &["query", "match[]"];

/// How a backend endpoint is treated by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
	/// Evaluates `query` or selects by `match[]`.
	Scoped,
	/// Lists label names or values; unconfined unless `match[]` is given.
	LabelMetadata,
	/// Anything else, e.g. targets, rules, status pages.
	Unscoped,
}

impl Endpoint {
	pub fn of(path: &str) -> Endpoint {
		let path = path.trim_end_matches('/');
		match path {
			"/api/v1/query" | "/api/v1/query_range" | "/api/v1/query_exemplars" | "/api/v1/series" => Endpoint::Scoped,
			"/api/v1/labels" => Endpoint::LabelMetadata,
			_ => match path.strip_prefix("/api/v1/label/").and_then(|rest| rest.strip_suffix("/values")) {
				Some(name) if !name.is_empty() && !name.contains('/') => Endpoint::LabelMetadata,
				_ => Endpoint::Unscoped,
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
	/// Re-encoded parameters, in their original order.
	pub encoded: String,
	/// Number of `query`/`match[]` values that were confined.
	pub scoped: usize,
}

/**
Confines every `query` and `match[]` value in a `application/x-www-form-urlencoded` string.

Other parameters are passed through untouched; the first query that can not be confined fails the whole request.
*/
pub fn rewrite_params(encoded: &str, scope: &Scope, opts: ParserOptions) -> Result<Rewritten, Error> {
	let mut out = form_urlencoded::Serializer::new(String::new());
	let mut scoped = 0;

	for (key, value) in form_urlencoded::parse(encoded.as_bytes()) {
		if QUERY_PARAMS.contains(&key.as_ref()) {
			let confined = parse_and_scope(&value, scope, opts)?;
			debug!("{}: {:?} -> {:?}", key, value, confined);
			out.append_pair(&key, &confined);
			scoped += 1;
		} else {
			out.append_pair(&key, &value);
		}
	}

	Ok(Rewritten {
		encoded: out.finish(),
		scoped,
	})
}

/// Label listings without `match[]` would reveal every series, so they get one built from the scope itself.
pub(crate) fn restrict_label_metadata(rewritten: &mut Rewritten, scope: &Scope) {
	if rewritten.scoped > 0 {
		return;
	}
	if let Some(selector) = scope.selector() {
		let mut out = form_urlencoded::Serializer::for_suffix(std::mem::take(&mut rewritten.encoded), 0);
		out.append_pair("match[]", &selector.to_string());
		rewritten.encoded = out.finish();
		rewritten.scoped += 1;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ScopeViolation;

	fn prod() -> Scope {
		Scope::new().with("cluster", "prod").unwrap()
	}

	fn decoded(encoded: &str) -> Vec<(String, String)> {
		form_urlencoded::parse(encoded.as_bytes()).into_owned().collect()
	}

	#[test]
	fn endpoints() {
		assert_eq!(Endpoint::of("/api/v1/query"), Endpoint::Scoped);
		assert_eq!(Endpoint::of("/api/v1/query_range/"), Endpoint::Scoped);
		assert_eq!(Endpoint::of("/api/v1/series"), Endpoint::Scoped);
		assert_eq!(Endpoint::of("/api/v1/query_exemplars"), Endpoint::Scoped);
		assert_eq!(Endpoint::of("/api/v1/labels"), Endpoint::LabelMetadata);
		assert_eq!(Endpoint::of("/api/v1/label/job/values"), Endpoint::LabelMetadata);
		assert_eq!(Endpoint::of("/api/v1/label//values"), Endpoint::Unscoped);
		assert_eq!(Endpoint::of("/api/v1/targets"), Endpoint::Unscoped);
		assert_eq!(Endpoint::of("/api/v1/status/config"), Endpoint::Unscoped);
	}

	#[test]
	fn rewrites_queries_only() {
		let r = rewrite_params("query=up&time=1700000000&step=15s", &prod(), ParserOptions::default()).unwrap();
		assert_eq!(r.scoped, 1);
		assert_eq!(
			decoded(&r.encoded),
			vec![
				("query".to_string(), "up{cluster=\"prod\"}".to_string()),
				("time".to_string(), "1700000000".to_string()),
				("step".to_string(), "15s".to_string()),
			]
		);
	}

	#[test]
	fn rewrites_every_match() {
		let r = rewrite_params(
			"match%5B%5D=up&start=1&match%5B%5D=%7Bjob%3D%22node%22%7D",
			&prod(),
			ParserOptions::default(),
		)
		.unwrap();
		assert_eq!(r.scoped, 2);
		assert_eq!(
			decoded(&r.encoded),
			vec![
				("match[]".to_string(), "up{cluster=\"prod\"}".to_string()),
				("start".to_string(), "1".to_string()),
				("match[]".to_string(), "{job=\"node\",cluster=\"prod\"}".to_string()),
			]
		);
	}

	#[test]
	fn rejects_whole_request() {
		let err = rewrite_params(
			"match[]=up&match[]=up%7Bcluster%3D~%22.%2B%22%7D",
			&prod(),
			ParserOptions::default(),
		)
		.unwrap_err();
		assert!(matches!(err, Error::Scope(ScopeViolation::WideningMatcher(_))));

		let err = rewrite_params("query=sum(", &prod(), ParserOptions::default()).unwrap_err();
		assert!(err.is_malformed());
	}

	#[test]
	fn empty_scope_normalizes() {
		let r = rewrite_params("query=sum+by(job)(up)", &Scope::new(), ParserOptions::default()).unwrap();
		assert_eq!(decoded(&r.encoded), vec![("query".to_string(), "sum(up) by (job)".to_string())]);
	}

	#[test]
	fn label_metadata() {
		let mut r = rewrite_params("start=1", &prod(), ParserOptions::default()).unwrap();
		restrict_label_metadata(&mut r, &prod());
		assert_eq!(
			decoded(&r.encoded),
			vec![
				("start".to_string(), "1".to_string()),
				("match[]".to_string(), "{cluster=\"prod\"}".to_string()),
			]
		);

		let mut r = rewrite_params("match[]=up", &prod(), ParserOptions::default()).unwrap();
		let before = r.clone();
		restrict_label_metadata(&mut r, &prod());
		assert_eq!(r, before);

		let mut r = rewrite_params("", &Scope::new(), ParserOptions::default()).unwrap();
		restrict_label_metadata(&mut r, &Scope::new());
		assert_eq!(r.encoded, "");
	}
}
