use crate::expr::Node;
use crate::lexer::{Keyword, TokenKind};
use crate::parser::{Parser, SyntaxError};

/// Label filter operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum LabelMatchOp {
	/** `=`  */
	Eq,
	/** `!=` */
	Ne,
	/** `=~` */
	REq,
	/** `!~` */
	RNe,
}

impl LabelMatchOp {
	pub fn as_str(self) -> &'static str {
		match self {
			LabelMatchOp::Eq => "=",
			LabelMatchOp::Ne => "!=",
			LabelMatchOp::REq => "=~",
			LabelMatchOp::RNe => "!~",
		}
	}
}

/// Single label filter.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct LabelMatch {
	pub name: String,
	pub op: LabelMatchOp,
	pub value: String,
}

impl LabelMatch {
	/// `name="value"`
	pub fn equal<N: Into<String>, V: Into<String>>(name: N, value: V) -> LabelMatch {
		LabelMatch {
			name: name.into(),
			op: LabelMatchOp::Eq,
			value: value.into(),
		}
	}
}

/**
Instant vector selector: `foo{bar="baz"}`.

Metric name is optional (as in `{instance="localhost", job="foo"}`), but a selector without both the name and label filters is not valid.
Metric names can also be matched using the special label called `__name__` (e.g. `{__name__=~"megaexporter_.+"}`); such filters are kept in `labels` as written.

```
use promql_scope::*;

assert_eq!(
	parse("foo{bar='baz'}", ParserOptions::default()).unwrap(),
	Node::Vector(InstantSelector {
		name: Some("foo".to_string()),
		labels: vec![
			LabelMatch { name: "bar".to_string(), op: LabelMatchOp::Eq, value: "baz".to_string() },
		],
	})
);
```
*/
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct InstantSelector {
	/// Metric name, if given outside of the braces.
	pub name: Option<String>,
	/// Set of label filters, in source order.
	pub labels: Vec<LabelMatch>,
}

/// Range vector selector: `foo{bar="baz"}[5m]`.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct MatrixSelector {
	pub vector: InstantSelector,
	/// Range, e.g. `5m` in `[5m]`
	pub range: Duration,
	/// Resolution, if given in subquery form (`[5m:30s]`, `[5m:]`).
	pub resolution: Option<Resolution>,
}

/// `:step` part of a range; the step is optional (`[1h:]` uses the default evaluation interval).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Resolution {
	pub step: Option<Duration>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum DurationUnit {
	Seconds,
	Minutes,
	Hours,
	Days,
	Weeks,
	Years,
}

impl DurationUnit {
	fn from_suffix(c: char) -> Option<DurationUnit> {
		Some(match c {
			's' => DurationUnit::Seconds,
			'm' => DurationUnit::Minutes,
			'h' => DurationUnit::Hours,
			'd' => DurationUnit::Days,
			'w' => DurationUnit::Weeks,
			'y' => DurationUnit::Years,
			_ => return None,
		})
	}

	pub fn suffix(self) -> char {
		match self {
			DurationUnit::Seconds => 's',
			DurationUnit::Minutes => 'm',
			DurationUnit::Hours => 'h',
			DurationUnit::Days => 'd',
			DurationUnit::Weeks => 'w',
			DurationUnit::Years => 'y',
		}
	}

	pub fn seconds(self) -> u64 {
		match self {
			DurationUnit::Seconds => 1,
			DurationUnit::Minutes => 60,
			DurationUnit::Hours => 60 * 60,
			DurationUnit::Days => 60 * 60 * 24,
			DurationUnit::Weeks => 60 * 60 * 24 * 7,
			// no leap years in PromQL either
			DurationUnit::Years => 60 * 60 * 24 * 365,
		}
	}
}

/// Duration literal, kept in the unit it was written in.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct Duration {
	pub value: u64,
	pub unit: DurationUnit,
}

impl Duration {
	/// Length in seconds, e.g. `300` for `5m`.
	pub fn as_secs(&self) -> u64 {
		self.value.saturating_mul(self.unit.seconds())
	}
}

impl<'t> Parser<'t> {
	pub(crate) fn label_name(&mut self) -> Result<String, SyntaxError> {
		let token = self.peek();
		// `inf` and `nan` lex as numbers, but are still names
		let spelled = token.kind == TokenKind::Number && token.lexeme.starts_with(|c: char| c.is_ascii_alphabetic());
		if token.kind.is_label_name() || spelled {
			Ok(self.bump().lexeme.clone())
		} else {
			Err(self.unexpected("label name"))
		}
	}

	/// `(label, label, …)`; trailing comma is allowed.
	pub(crate) fn label_list(&mut self) -> Result<Vec<String>, SyntaxError> {
		self.expect(TokenKind::LeftParen, "\"(\"")?;
		let mut labels = Vec::new();
		while !self.eat(TokenKind::RightParen) {
			labels.push(self.label_name()?);
			if !self.eat(TokenKind::Comma) {
				self.expect(TokenKind::RightParen, "\",\" or \")\"")?;
				break;
			}
		}
		Ok(labels)
	}

	fn label_match(&mut self) -> Result<LabelMatch, SyntaxError> {
		let name = self.label_name()?;
		let op = match self.peek_kind() {
			TokenKind::Assign => LabelMatchOp::Eq,
			TokenKind::Neq => LabelMatchOp::Ne,
			TokenKind::EqlRegex => LabelMatchOp::REq,
			TokenKind::NeqRegex => LabelMatchOp::RNe,
			_ => return Err(self.unexpected("label matching operator")),
		};
		self.bump();
		let value = self.expect(TokenKind::String, "string")?.lexeme.clone();
		Ok(LabelMatch { name, op, value })
	}

	fn label_set(&mut self) -> Result<Vec<LabelMatch>, SyntaxError> {
		self.expect(TokenKind::LeftBrace, "\"{\"")?;
		let mut labels = Vec::new();
		while !self.eat(TokenKind::RightBrace) {
			labels.push(self.label_match()?);
			if !self.eat(TokenKind::Comma) {
				self.expect(TokenKind::RightBrace, "\",\" or \"}\"")?;
				break;
			}
		}
		Ok(labels)
	}

	pub(crate) fn instant_selector(&mut self) -> Result<InstantSelector, SyntaxError> {
		let start = self.peek().clone();
		let name = match self.peek_kind() {
			TokenKind::Identifier | TokenKind::MetricIdentifier => Some(self.bump().lexeme.clone()),
			_ => None,
		};
		let labels = if self.peek_kind() == TokenKind::LeftBrace {
			self.label_set()?
		} else {
			vec![]
		};

		if name.is_none() && labels.is_empty() {
			return Err(SyntaxError {
				position: start.position,
				expected: "vector selector with a metric name or at least one label matcher".to_string(),
				found: "\"{}\"".to_string(),
			});
		}
		Ok(InstantSelector { name, labels })
	}

	fn duration(&mut self) -> Result<Duration, SyntaxError> {
		let token = self.expect(TokenKind::Duration, "duration")?.clone();
		// lexer guarantees digits followed by a single unit character
		let split = token.lexeme.len() - 1;
		let unit = token.lexeme[split..]
			.chars()
			.next()
			.and_then(DurationUnit::from_suffix);
		match (token.lexeme[..split].parse::<u64>(), unit) {
			(Ok(value), Some(unit)) => Ok(Duration { value, unit }),
			_ => Err(SyntaxError::new(&token, "duration that fits into 64 bits")),
		}
	}

	// `[range]` and `[range:step]`; only selectors take plain ranges, anything else becomes a subquery
	fn range_suffix(&mut self, x: Node) -> Result<Node, SyntaxError> {
		let open = self.bump().clone();
		let range = self.duration()?;
		let resolution = if self.eat(TokenKind::Colon) {
			let step = if self.peek_kind() == TokenKind::Duration {
				Some(self.duration()?)
			} else {
				None
			};
			Some(Resolution { step })
		} else {
			None
		};
		self.expect(TokenKind::RightBracket, "\"]\"")?;

		match (x, resolution) {
			(Node::Vector(vector), resolution) => Ok(Node::Matrix(MatrixSelector { vector, range, resolution })),
			(Node::Matrix(MatrixSelector { resolution: None, .. }), _) => {
				Err(SyntaxError::new(&open, "an operator (range vectors can not be ranged over)"))
			}
			(x, Some(resolution)) => Ok(Node::Subquery {
				x: Box::new(x),
				range,
				resolution,
			}),
			(_, None) => Err(SyntaxError::new(&open, "\":\" (plain ranges are only valid for vector selectors)")),
		}
	}

	fn offset_suffix(&mut self, x: Node) -> Result<Node, SyntaxError> {
		let offset = self.peek().clone();
		match x {
			Node::Vector(_) | Node::Matrix(_) | Node::Subquery { .. } => (),
			_ => return Err(SyntaxError::new(&offset, "an operator (offset only applies to selectors and subqueries)")),
		}
		self.bump();
		let offset = self.duration()?;
		Ok(Node::Offset {
			x: Box::new(x),
			offset,
		})
	}

	pub(crate) fn postfix(&mut self) -> Result<Node, SyntaxError> {
		self.chained(|p| {
			let mut x = p.atom()?;
			loop {
				x = match p.peek_kind() {
					TokenKind::LeftBracket => {
						p.deepen()?;
						p.range_suffix(x)?
					}
					TokenKind::Keyword(Keyword::Offset) => {
						p.deepen()?;
						p.offset_suffix(x)?
					}
					_ => return Ok(x),
				};
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{parse, ParserOptions};
	use crate::error::Error;
	use crate::functions::AggregationOp;

	fn selector(text: &str, opts: ParserOptions) -> InstantSelector {
		match parse(text, opts) {
			Ok(Node::Vector(v)) => v,
			other => panic!("expected selector for {:?}, got {:?}", text, other),
		}
	}

	fn rejected(text: &str) -> SyntaxError {
		match parse(text, ParserOptions::default()) {
			Err(Error::Syntax(err)) => err,
			other => panic!("expected syntax error for {:?}, got {:?}", text, other),
		}
	}

	fn duration(value: u64, unit: DurationUnit) -> Duration {
		Duration { value, unit }
	}

	fn foo() -> InstantSelector {
		InstantSelector {
			name: Some("foo".to_string()),
			labels: vec![],
		}
	}

	#[test]
	fn instant_vectors_period() {
		instant_vectors(ParserOptions::new().allow_periods(true).build());

		assert_eq!(
			selector("foo.bar{}", ParserOptions::new().allow_periods(true).build()),
			InstantSelector {
				name: Some("foo.bar".to_string()),
				labels: vec![],
			}
		);
	}

	#[test]
	fn instant_vectors_no_period() {
		instant_vectors(ParserOptions::default());

		assert!(parse("foo.bar{}", ParserOptions::default()).is_err());
	}

	fn instant_vectors(opts: ParserOptions) {
		assert_eq!(selector("foo", opts), foo());
		assert_eq!(selector("foo { }", opts), foo());

		assert_eq!(
			selector("foo { bar = 'baz', quux !~ 'xyzzy', lorem = `ipsum \\n dolor \"sit amet\"` }", opts),
			InstantSelector {
				name: Some("foo".to_string()),
				labels: vec![
					LabelMatch::equal("bar", "baz"),
					LabelMatch {
						name: "quux".to_string(),
						op: LabelMatchOp::RNe,
						value: "xyzzy".to_string(),
					},
					LabelMatch::equal("lorem", "ipsum \\n dolor \"sit amet\""),
				],
			}
		);

		assert_eq!(
			selector("{instance!=\"localhost\", job=~'.+',}", opts),
			InstantSelector {
				name: None,
				labels: vec![
					LabelMatch {
						name: "instance".to_string(),
						op: LabelMatchOp::Ne,
						value: "localhost".to_string(),
					},
					LabelMatch {
						name: "job".to_string(),
						op: LabelMatchOp::REq,
						value: ".+".to_string(),
					},
				],
			}
		);

		// duplicates are kept as written
		assert_eq!(
			selector("{__name__=~'up|down', job='a', job='a'}", opts).labels.len(),
			3
		);

		assert_eq!(
			selector("job:request_errors:rate5m{by='sum', offset=\"1\"}", opts),
			InstantSelector {
				name: Some("job:request_errors:rate5m".to_string()),
				labels: vec![
					LabelMatch::equal("by", "sum"),
					LabelMatch::equal("offset", "1"),
				],
			}
		);
	}

	#[test]
	fn empty_selector() {
		let err = rejected("{}");
		assert_eq!(err.position, 0);
		assert_eq!(err.expected, "vector selector with a metric name or at least one label matcher");

		let err = rejected("sum({ })");
		assert_eq!(err.position, 4);
	}

	#[test]
	fn number_words_as_label_names() {
		assert_eq!(
			selector("foo{nan='x', Inf='y'}", ParserOptions::default()),
			InstantSelector {
				name: Some("foo".to_string()),
				labels: vec![LabelMatch::equal("nan", "x"), LabelMatch::equal("Inf", "y")],
			}
		);
		assert!(parse("sum by (inf) (foo)", ParserOptions::default()).is_ok());
		assert!(parse("foo / on (NaN) bar", ParserOptions::default()).is_ok());

		assert_eq!(rejected("foo{1='x'}").expected, "label name");
	}

	#[test]
	fn matcher_errors() {
		let err = rejected("foo{bar}");
		assert_eq!(err.position, 7);
		assert_eq!(err.expected, "label matching operator");

		let err = rejected("foo{bar=baz}");
		assert_eq!(err.expected, "string");
		assert_eq!(err.found, "\"baz\"");

		let err = rejected("foo{job:x='1'}");
		assert_eq!(err.expected, "label name");

		assert!(rejected("foo{a='b' c='d'}").expected.contains("\"}\""));
		assert!(rejected("foo{a='b'").is_at_end());
	}

	#[test]
	fn durations() {
		assert_eq!(duration(5, DurationUnit::Minutes).as_secs(), 300);
		assert_eq!(duration(1, DurationUnit::Years).as_secs(), 31_536_000);
		assert_eq!(duration(u64::MAX, DurationUnit::Weeks).as_secs(), u64::MAX);

		let err = rejected("foo[99999999999999999999s]");
		assert_eq!(err.position, 4);
	}

	#[test]
	fn modified_vectors() {
		assert_eq!(
			parse("foo [5m]", ParserOptions::default()).unwrap(),
			Node::Matrix(MatrixSelector {
				vector: foo(),
				range: duration(5, DurationUnit::Minutes),
				resolution: None,
			})
		);

		assert_eq!(
			parse("foo offset 1w", ParserOptions::default()).unwrap(),
			Node::Offset {
				x: Box::new(Node::Vector(foo())),
				offset: duration(1, DurationUnit::Weeks),
			}
		);

		assert_eq!(
			parse("foo[1h:30s] offset 1d", ParserOptions::default()).unwrap(),
			Node::Offset {
				x: Box::new(Node::Matrix(MatrixSelector {
					vector: foo(),
					range: duration(1, DurationUnit::Hours),
					resolution: Some(Resolution {
						step: Some(duration(30, DurationUnit::Seconds)),
					}),
				})),
				offset: duration(1, DurationUnit::Days),
			}
		);

		assert_eq!(
			parse("foo[1h:]", ParserOptions::default()).unwrap(),
			Node::Matrix(MatrixSelector {
				vector: foo(),
				range: duration(1, DurationUnit::Hours),
				resolution: Some(Resolution { step: None }),
			})
		);
	}

	#[test]
	fn subqueries() {
		let inner = parse("sum(foo)", ParserOptions::default()).unwrap();
		assert!(matches!(inner, Node::Aggregation { op: AggregationOp::Sum, .. }));

		assert_eq!(
			parse("sum(foo)[30m:1m] offset 5m", ParserOptions::default()).unwrap(),
			Node::Offset {
				x: Box::new(Node::Subquery {
					x: Box::new(inner),
					range: duration(30, DurationUnit::Minutes),
					resolution: Resolution {
						step: Some(duration(1, DurationUnit::Minutes)),
					},
				}),
				offset: duration(5, DurationUnit::Minutes),
			}
		);

		// subquery of a subquery
		assert!(matches!(
			parse("foo[5m:][1h:5m]", ParserOptions::default()).unwrap(),
			Node::Subquery { .. }
		));
	}

	#[test]
	fn postfix_errors() {
		let err = rejected("sum(foo)[5m]");
		assert_eq!(err.position, 8);
		assert_eq!(err.found, "\"[\"");

		let err = rejected("foo[5m][10m:1m]");
		assert_eq!(err.position, 7);

		let err = rejected("foo offset 5m offset 1m");
		assert_eq!(err.position, 14);

		let err = rejected("(foo) offset 5m");
		assert_eq!(err.position, 6);

		assert_eq!(rejected("foo[5]").expected, "duration");
		assert_eq!(rejected("foo[5m").expected, "\"]\"");
		assert!(parse("foo offset", ParserOptions::default()).is_err());
	}
}
