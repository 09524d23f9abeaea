/*!
Confinement of queries to a set of required label values.

Every instant selector in a query has to end up with an equality matcher for each scoped label.
Missing matchers are added; matchers that could select anything outside of the scope reject the whole query instead of being corrected.
*/

use std::fmt;
use crate::expr::Node;
use crate::str::quote;
use crate::vec::{InstantSelector, LabelMatch, LabelMatchOp};
use crate::visit::Visitor;

const METRIC_NAME_LABEL: &str = "__name__";

/// Single required `label="value"` pair.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Constraint {
	pub label: String,
	pub value: String,
}

quick_error! {
	/// Scope definition that can not be satisfied by any series.
	#[derive(Debug, Clone, PartialEq)]
	pub enum ScopeError {
		Conflict(label: String, first: String, second: String) {
			display("label {} is bound to both {} and {}", label, quote(first), quote(second))
		}
	}
}

quick_error! {
	/// Query that selects, or could select, series outside of the scope.
	#[derive(Debug, Clone, PartialEq)]
	pub enum ScopeViolation {
		/// `label="other"` where the scope requires `label="value"`.
		ConflictingValue(matcher: LabelMatch, required: String) {
			display("matcher {} conflicts with the required {}={}", matcher, matcher.name, quote(required))
		}
		/// `!=`, `=~` or `!~` on a scoped label.
		WideningMatcher(matcher: LabelMatch) {
			display("matcher {} is not allowed on the scoped label {}", matcher, matcher.name)
		}
	}
}

impl ScopeViolation {
	/// The offending user-supplied matcher.
	pub fn matcher(&self) -> &LabelMatch {
		match self {
			ScopeViolation::ConflictingValue(matcher, _) => matcher,
			ScopeViolation::WideningMatcher(matcher) => matcher,
		}
	}
}

/**
Ordered set of label constraints every selector of a query has to satisfy.

An empty scope puts no restrictions on a query.

```
use promql_scope::*;

let scope = Scope::new()
	.with("cluster", "prod").unwrap()
	.with("org", "acme").unwrap();

let ast = parse("sum(rate(http_requests_total[5m]))", ParserOptions::default()).unwrap();
assert_eq!(
	inject(&ast, &scope).unwrap().to_string(),
	r#"sum(rate(http_requests_total{cluster="prod",org="acme"}[5m]))"#
);
```
*/
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Scope {
	constraints: Vec<Constraint>,
}

impl Scope {
	pub fn new() -> Scope {
		Scope::default()
	}

	/// Adds a constraint; an exact duplicate is ignored, another value for an already bound label is an error.
	pub fn with<L: Into<String>, V: Into<String>>(mut self, label: L, value: V) -> Result<Scope, ScopeError> {
		self.push(label.into(), value.into())?;
		Ok(self)
	}

	pub fn from_pairs<I, L, V>(pairs: I) -> Result<Scope, ScopeError>
	where
		I: IntoIterator<Item = (L, V)>,
		L: Into<String>,
		V: Into<String>,
	{
		let mut scope = Scope::new();
		for (label, value) in pairs {
			scope.push(label.into(), value.into())?;
		}
		Ok(scope)
	}

	fn push(&mut self, label: String, value: String) -> Result<(), ScopeError> {
		match self.get(&label) {
			Some(existing) if existing == value => Ok(()),
			Some(existing) => Err(ScopeError::Conflict(label, existing.to_string(), value)),
			None => {
				self.constraints.push(Constraint { label, value });
				Ok(())
			}
		}
	}

	pub fn constraints(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn is_empty(&self) -> bool {
		self.constraints.is_empty()
	}

	/// Value required for `label`, if it is scoped.
	pub fn get(&self, label: &str) -> Option<&str> {
		self.constraints
			.iter()
			.find(|c| c.label == label)
			.map(|c| c.value.as_str())
	}

	/// The scope itself as a selector, e.g. `{cluster="prod"}`; `None` for an empty scope.
	pub fn selector(&self) -> Option<InstantSelector> {
		if self.is_empty() {
			return None;
		}
		Some(InstantSelector {
			name: None,
			labels: self
				.constraints
				.iter()
				.map(|c| LabelMatch::equal(&c.label, &c.value))
				.collect(),
		})
	}

	/**
	Confines a single selector: adds an equality matcher for every scoped label it does not match on yet.

	Either succeeds completely or leaves `vector` untouched.
	*/
	pub fn apply(&self, vector: &mut InstantSelector) -> Result<(), ScopeViolation> {
		let mut missing = Vec::new();

		for constraint in &self.constraints {
			let mut satisfied = false;

			// metric name outside of the braces is just another way to write `__name__="…"`
			if constraint.label == METRIC_NAME_LABEL {
				if let Some(name) = &vector.name {
					if *name != constraint.value {
						return Err(ScopeViolation::ConflictingValue(
							LabelMatch::equal(METRIC_NAME_LABEL, name.as_str()),
							constraint.value.clone(),
						));
					}
					satisfied = true;
				}
			}

			// every matcher on the label counts, not just the first one
			for matcher in vector.labels.iter().filter(|m| m.name == constraint.label) {
				match matcher.op {
					LabelMatchOp::Eq if matcher.value == constraint.value => satisfied = true,
					LabelMatchOp::Eq => {
						return Err(ScopeViolation::ConflictingValue(matcher.clone(), constraint.value.clone()));
					}
					LabelMatchOp::Ne | LabelMatchOp::REq | LabelMatchOp::RNe => {
						return Err(ScopeViolation::WideningMatcher(matcher.clone()));
					}
				}
			}

			if !satisfied {
				missing.push(LabelMatch::equal(&constraint.label, &constraint.value));
			}
		}

		vector.labels.extend(missing);
		Ok(())
	}
}

impl fmt::Display for Constraint {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}={}", self.label, quote(&self.value))
	}
}

struct Injector<'s> {
	scope: &'s Scope,
}

impl<'s> Visitor for Injector<'s> {
	type Error = ScopeViolation;

	fn visit_vector(&mut self, vector: &mut InstantSelector) -> Result<(), ScopeViolation> {
		self.scope.apply(vector)
	}
}

/**
Returns a copy of `ast` where every selector is confined to `scope`.

Injecting into an already confined tree returns an identical tree.
*/
pub fn inject(ast: &Node, scope: &Scope) -> Result<Node, ScopeViolation> {
	let mut ast = ast.clone();
	inject_in_place(&mut ast, scope)?;
	Ok(ast)
}

/// Same as [`inject`], but rewrites `ast` itself; on error the tree may be partially confined.
pub fn inject_in_place(ast: &mut Node, scope: &Scope) -> Result<(), ScopeViolation> {
	if scope.is_empty() {
		return Ok(());
	}
	Injector { scope }.visit_node(ast)
}
