/*!
AST → query text.

Output is canonical rather than faithful: whitespace and quoting are normalized, `Paren` nodes are kept, and parentheses are added wherever a tree built by hand would otherwise re-parse with a different grouping.
*/

use std::fmt::{self, Display, Formatter, Write};
use crate::expr::{Node, Op, OpGroupMod, OpGroupSide, OpMod, OpModAction, UnaryOp};
use crate::functions::{AggregationAction, AggregationMod, AggregationOp};
use crate::str::quote;
use crate::vec::{Duration, InstantSelector, LabelMatch, LabelMatchOp, MatrixSelector, Resolution};

fn write_list<T: Display>(f: &mut Formatter, items: &[T], separator: &str) -> fmt::Result {
	for (i, item) in items.iter().enumerate() {
		if i > 0 {
			f.write_str(separator)?;
		}
		write!(f, "{}", item)?;
	}
	Ok(())
}

// `(a, b)`
fn write_labels(f: &mut Formatter, labels: &[String]) -> fmt::Result {
	f.write_char('(')?;
	write_list(f, labels, ", ")?;
	f.write_char(')')
}

impl Display for LabelMatchOp {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Display for LabelMatch {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}{}{}", self.name, self.op, quote(&self.value))
	}
}

impl Display for InstantSelector {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		if let Some(name) = &self.name {
			f.write_str(name)?;
		}
		if !self.labels.is_empty() || self.name.is_none() {
			f.write_char('{')?;
			write_list(f, &self.labels, ",")?;
			f.write_char('}')?;
		}
		Ok(())
	}
}

impl Display for Duration {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}{}", self.value, self.unit.suffix())
	}
}

impl Display for Resolution {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_char(':')?;
		match &self.step {
			Some(step) => write!(f, "{}", step),
			None => Ok(()),
		}
	}
}

impl Display for MatrixSelector {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}[{}", self.vector, self.range)?;
		if let Some(resolution) = &self.resolution {
			write!(f, "{}", resolution)?;
		}
		f.write_char(']')
	}
}

impl Display for Op {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Display for UnaryOp {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Display for OpMod {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(match self.action {
			OpModAction::RestrictTo => "on ",
			OpModAction::Ignore => "ignoring ",
		})?;
		write_labels(f, &self.labels)?;
		if let Some(group) = &self.group {
			write!(f, " {}", group)?;
		}
		Ok(())
	}
}

// label list is always written out, even if empty: `group_left (x)` would otherwise swallow a parenthesized right operand
impl Display for OpGroupMod {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(match self.side {
			OpGroupSide::Left => "group_left ",
			OpGroupSide::Right => "group_right ",
		})?;
		write_labels(f, &self.labels)
	}
}

impl Display for AggregationOp {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Display for AggregationMod {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(match self.action {
			AggregationAction::By => "by ",
			AggregationAction::Without => "without ",
		})?;
		write_labels(f, &self.labels)
	}
}

fn write_scalar(f: &mut Formatter, n: f64) -> fmt::Result {
	if n.is_nan() {
		f.write_str("NaN")
	} else if n.is_infinite() {
		f.write_str(if n > 0. { "Inf" } else { "-Inf" })
	} else {
		write!(f, "{}", n)
	}
}

// operand of a binary operator needs parentheses if it binds looser than the operator,
// or equally tight but on the side the operator does not group to
fn needs_parens(operand: &Node, parent: Op, right: bool) -> bool {
	match operand {
		Node::Operator { op, .. } => {
			op.precedence() < parent.precedence()
				|| (op.precedence() == parent.precedence() && right != parent.is_right_associative())
		}
		_ => false,
	}
}

fn write_operand(f: &mut Formatter, operand: &Node, parent: Op, right: bool) -> fmt::Result {
	if needs_parens(operand, parent, right) {
		write!(f, "({})", operand)
	} else {
		write!(f, "{}", operand)
	}
}

// range, subquery and offset suffixes bind tighter than any operator
fn write_suffixed(f: &mut Formatter, x: &Node) -> fmt::Result {
	match x {
		Node::Operator { .. } | Node::Unary { .. } => write!(f, "({})", x),
		Node::Scalar(n) if n.is_sign_negative() => write!(f, "({})", x),
		_ => write!(f, "{}", x),
	}
}

impl Display for Node {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Node::Operator { x, op, y, bool_modifier, matching } => {
				write_operand(f, x, *op, false)?;
				write!(f, " {}", op)?;
				if *bool_modifier {
					f.write_str(" bool")?;
				}
				if let Some(matching) = matching {
					write!(f, " {}", matching)?;
				}
				f.write_char(' ')?;
				write_operand(f, y, *op, true)
			}
			Node::Unary { op, x } => {
				write!(f, "{}", op)?;
				match **x {
					Node::Operator { .. } => write!(f, "({})", x),
					_ => write!(f, "{}", x),
				}
			}
			Node::Aggregation { op, args, aggregation } => {
				write!(f, "{}(", op)?;
				write_list(f, args, ", ")?;
				f.write_char(')')?;
				if let Some(aggregation) = aggregation {
					write!(f, " {}", aggregation)?;
				}
				Ok(())
			}
			Node::Function { name, args } => {
				write!(f, "{}(", name)?;
				write_list(f, args, ", ")?;
				f.write_char(')')
			}
			Node::Vector(vector) => write!(f, "{}", vector),
			Node::Matrix(matrix) => write!(f, "{}", matrix),
			Node::Subquery { x, range, resolution } => {
				write_suffixed(f, x)?;
				write!(f, "[{}{}]", range, resolution)
			}
			Node::Offset { x, offset } => {
				write_suffixed(f, x)?;
				write!(f, " offset {}", offset)
			}
			Node::Paren(x) => write!(f, "({})", x),
			Node::Scalar(n) => write_scalar(f, *n),
			Node::String(s) => f.write_str(&quote(s)),
		}
	}
}

/// Canonical query text for `ast`; parsing it back yields the same tree.
pub fn render(ast: &Node) -> String {
	ast.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{parse, ParserOptions, Scope, inject};
	use crate::vec::DurationUnit;

	fn canonical(text: &str) -> String {
		render(&parse(text, ParserOptions::default()).unwrap())
	}

	fn foo() -> Node {
		Node::Vector(InstantSelector {
			name: Some("foo".to_string()),
			labels: vec![],
		})
	}

	fn bar() -> Node {
		Node::Vector(InstantSelector {
			name: None,
			labels: vec![LabelMatch::equal("job", "bar")],
		})
	}

	#[test]
	fn normalizes() {
		assert_eq!(canonical("foo{ a = 'b' , c !~ \"d\" , }"), "foo{a=\"b\",c!~\"d\"}");
		assert_eq!(canonical("foo {}"), "foo");
		assert_eq!(canonical("sum by(a,b)(x)"), "sum(x) by (a, b)");
		assert_eq!(canonical("a>bool on(b)group_left c"), "a > bool on (b) group_left () c");
		assert_eq!(canonical("rate ( x [ 5m ] )"), "rate(x[5m])");
		assert_eq!(canonical("x[1h:] offset 5m"), "x[1h:] offset 5m");
		assert_eq!(canonical("max_over_time(rate(x[1m])[1h:30s])"), "max_over_time(rate(x[1m])[1h:30s])");
		assert_eq!(canonical("`raw\\d`"), "\"raw\\\\d\"");
		assert_eq!(canonical("1e3 + .5 + Inf + nan"), "1000 + 0.5 + Inf + NaN");
		assert_eq!(canonical("- -a"), "--a");
		assert_eq!(canonical("((a))"), "((a))");
	}

	#[test]
	fn parenthesizes_built_trees() {
		let sum = Node::operator(foo(), Op::Plus, bar());

		assert_eq!(
			Node::operator(sum.clone(), Op::Mul, foo()).to_string(),
			"(foo + {job=\"bar\"}) * foo"
		);
		assert_eq!(
			Node::operator(foo(), Op::Minus, sum.clone()).to_string(),
			"foo - (foo + {job=\"bar\"})"
		);
		assert_eq!(
			Node::operator(sum.clone(), Op::Minus, foo()).to_string(),
			"foo + {job=\"bar\"} - foo"
		);

		let pow = Node::operator(foo(), Op::Pow, foo());
		assert_eq!(Node::operator(pow.clone(), Op::Pow, foo()).to_string(), "(foo ^ foo) ^ foo");
		assert_eq!(Node::operator(foo(), Op::Pow, pow.clone()).to_string(), "foo ^ foo ^ foo");
		assert_eq!(Node::unary(UnaryOp::Minus, pow).to_string(), "-(foo ^ foo)");
		// signs bind tighter than `^`
		assert_eq!(Node::operator(Node::Scalar(-2.), Op::Pow, foo()).to_string(), "-2 ^ foo");

		assert_eq!(
			Node::Offset {
				x: Box::new(sum),
				offset: Duration { value: 5, unit: DurationUnit::Minutes },
			}
			.to_string(),
			"(foo + {job=\"bar\"}) offset 5m"
		);
	}

	#[test]
	fn built_trees_reparse() {
		let trees = vec![
			Node::operator(Node::operator(foo(), Op::Or, bar()), Op::And, foo()),
			Node::operator(foo(), Op::Div, Node::operator(bar(), Op::Mul, foo())),
			Node::unary(UnaryOp::Minus, Node::operator(foo(), Op::Plus, bar())),
			Node::operator(Node::Scalar(-2.), Op::Pow, Node::Scalar(3.)),
		];
		for tree in trees {
			let text = render(&tree);
			let reparsed = parse(&text, ParserOptions::default()).unwrap();
			// explicit parentheses come back as `Paren`, so compare the text instead
			assert_eq!(render(&reparsed).replace(&['(', ')'][..], ""), text.replace(&['(', ')'][..], ""), "{}", text);
			assert_eq!(reparsed.vectors().len(), tree.vectors().len());
		}
	}

	// literal scoping scenarios: one selector, a join of two, a nested aggregation, and a conflict
	#[test]
	fn scenarios() {
		let scope = Scope::new().with("cluster", "prod").unwrap();
		let run = |q: &str| inject(&parse(q, ParserOptions::default()).unwrap(), &scope).map(|ast| render(&ast));

		assert_eq!(
			run("http_requests_total"),
			Ok("http_requests_total{cluster=\"prod\"}".to_string())
		);
		assert_eq!(
			run("a / on(job) b"),
			Ok("a{cluster=\"prod\"} / on (job) b{cluster=\"prod\"}".to_string())
		);
		assert_eq!(
			run("sum(rate(x{path=\"/\"}[5m])) by (path)"),
			Ok("sum(rate(x{path=\"/\",cluster=\"prod\"}[5m])) by (path)".to_string())
		);
		assert!(run("x{cluster=\"dev\"}").is_err());
	}
}
