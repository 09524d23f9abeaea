/*!
This crate parses PromQL queries into an AST and confines them to a tenant's share of the metrics.

See [official documentation](https://prometheus.io/docs/prometheus/latest/querying/basics/) for query syntax description.

## Example

```
use promql_scope::*;

let ast = parse("
	sum(1 - something_used{env=\"production\"} / something_total) by (instance)
	and ignoring (instance)
	sum(rate(some_queries{instance=~\"localhost\\\\d+\"} [5m])) > 100
", ParserOptions::default()).unwrap(); // or show user that their query is invalid

// now we can look for all sorts of things

// AST can represent an operator
if let Node::Operator { ref x, op: Op::And, ref matching, .. } = ast {
	// operators can have modifiers
	assert_eq!(*matching, Some(OpMod {
		action: OpModAction::Ignore,
		labels: vec!["instance".to_string()],
		group: None,
	}));

	// aggregations carry their optional modifiers (`by (label1, …)`/`without (…)`)
	if let Node::Aggregation { op, ref aggregation, .. } = **x {
		assert_eq!(op, AggregationOp::Sum);
		assert_eq!(*aggregation, Some(AggregationMod {
			action: AggregationAction::By,
			labels: vec!["instance".to_string()],
		}));

		// …
	}
} else {
	panic!("top operator is not an \"and\"");
}

// every selector can be pinned to the labels a tenant is allowed to see
let scope = Scope::new().with("cluster", "prod").unwrap();
assert_eq!(
	parse_and_scope("up / on (job) down", &scope, ParserOptions::default()).unwrap(),
	"up{cluster=\"prod\"} / on (job) down{cluster=\"prod\"}",
);
assert!(parse_and_scope("up{cluster=~\".+\"}", &scope, ParserOptions::default()).is_err());
```
*/

#![cfg_attr(feature = "cargo-clippy", allow(clippy::tabs_in_doc_comments))]

#[macro_use]
extern crate quick_error;

pub(crate) mod str;
pub(crate) mod utils;
pub(crate) mod whitespace;
pub mod error;
pub mod expr;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod scope;
pub mod vec;
pub mod visit;

#[cfg(feature = "proxy")]
pub mod app;

pub use error::{Error, LexError};
pub use expr::*;
pub use functions::*;
pub use lexer::{tokenize, Keyword, Token, TokenKind};
pub use parser::{parse_tokens, SyntaxError};
pub use render::render;
pub use scope::{inject, inject_in_place, Constraint, Scope, ScopeError, ScopeViolation};
pub use vec::*;
pub use visit::{walk, Visitor};

use builder_pattern::Builder;

const DEFAULT_MAX_DEPTH: usize = 128;

/**
Options that allow or disallow certain query language features.

```
use promql_scope::ParserOptions;

let opts = ParserOptions::new()
	.comments(true)
	.allow_periods(true)
	.build();
assert_eq!(opts.max_depth, 128);
```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct ParserOptions {
	/**
	Allow periods in metric names (e.g. `threads.busy{instance="..."}`).

	This option is usually used in systems that have metrics carried over from other monitoring systems like Graphite.
	*/
	#[default(false)]
	pub allow_periods: bool,

	/// Treat `#` up to the end of the line as whitespace.
	#[default(false)]
	pub comments: bool,

	/// Maximum nesting of sub-expressions; deeper queries are rejected instead of exhausting the stack.
	#[default(DEFAULT_MAX_DEPTH)]
	pub max_depth: usize,
}

impl Default for ParserOptions {
	fn default() -> Self {
		ParserOptions::new().build()
	}
}

/**
Parse expression string into an AST.

Periods in metric names and comments are only accepted if enabled in `opts`.
*/
pub fn parse(text: &str, opts: ParserOptions) -> Result<Node, Error> {
	let tokens = tokenize(text, opts)?;
	Ok(parse_tokens(&tokens, opts)?)
}

/**
Parses `text`, confines every selector in it to `scope`, and renders the result back into a query.

This is the whole rewrite applied to each query passing through the proxy.
*/
pub fn parse_and_scope(text: &str, scope: &Scope, opts: ParserOptions) -> Result<String, Error> {
	let mut ast = parse(text, opts)?;
	inject_in_place(&mut ast, scope)?;
	Ok(render(&ast))
}
