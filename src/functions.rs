use crate::expr::Node;
use crate::lexer::{Keyword, TokenKind};
use crate::parser::{Parser, SyntaxError};

/// Names of the functions the parser recognizes; anything else followed by `(` is rejected.
pub static FUNCTIONS: &[&str] = &[
	"abs",
	"absent",
	"absent_over_time",
	"ceil",
	"changes",
	"clamp_max",
	"clamp_min",
	"day_of_month",
	"day_of_week",
	"days_in_month",
	"delta",
	"deriv",
	"exp",
	"floor",
	"histogram_quantile",
	"holt_winters",
	"hour",
	"idelta",
	"increase",
	"irate",
	"label_join",
	"label_replace",
	"ln",
	"minute",
	"month",
	"predict_linear",
	"rate",
	"resets",
	"round",
	"scalar",
	"sort",
	"sort_desc",
	"sqrt",
	"time",
	"timestamp",
	"vector",
	"year",
	"avg_over_time",
	"min_over_time",
	"max_over_time",
	"sum_over_time",
	"count_over_time",
	"quantile_over_time",
	"stddev_over_time",
	"stdvar_over_time",
];

/// Aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum AggregationOp {
	Sum,
	Min,
	Max,
	Avg,
	Group,
	Stddev,
	Stdvar,
	Count,
	CountValues,
	Bottomk,
	Topk,
	Quantile,
}

impl AggregationOp {
	pub const ALL: &'static [AggregationOp] = &[
		AggregationOp::Sum,
		AggregationOp::Min,
		AggregationOp::Max,
		AggregationOp::Avg,
		AggregationOp::Group,
		AggregationOp::Stddev,
		AggregationOp::Stdvar,
		AggregationOp::Count,
		AggregationOp::CountValues,
		AggregationOp::Bottomk,
		AggregationOp::Topk,
		AggregationOp::Quantile,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			AggregationOp::Sum => "sum",
			AggregationOp::Min => "min",
			AggregationOp::Max => "max",
			AggregationOp::Avg => "avg",
			AggregationOp::Group => "group",
			AggregationOp::Stddev => "stddev",
			AggregationOp::Stdvar => "stdvar",
			AggregationOp::Count => "count",
			AggregationOp::CountValues => "count_values",
			AggregationOp::Bottomk => "bottomk",
			AggregationOp::Topk => "topk",
			AggregationOp::Quantile => "quantile",
		}
	}

	/// Whether the operator takes a parameter before the aggregated expression, as in `topk(5, foo)`.
	pub fn takes_parameter(self) -> bool {
		matches!(
			self,
			AggregationOp::CountValues
				| AggregationOp::Bottomk
				| AggregationOp::Topk
				| AggregationOp::Quantile
		)
	}
}

#[derive(Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum AggregationAction {
	Without,
	By,
}

/// Aggregation operator modifier (`by (…)`/`without (…)`).
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct AggregationMod {
	/// Action applied to a list of labels; whether `by (…)` or `without (…)` is used.
	pub action: AggregationAction,
	pub labels: Vec<String>,
}

impl<'t> Parser<'t> {
	fn aggregation_mod(&mut self) -> Result<Option<AggregationMod>, SyntaxError> {
		let action = match self.peek_kind() {
			TokenKind::Keyword(Keyword::By) => AggregationAction::By,
			TokenKind::Keyword(Keyword::Without) => AggregationAction::Without,
			_ => return Ok(None),
		};
		self.bump();
		let labels = self.label_list()?;
		Ok(Some(AggregationMod { action, labels }))
	}

	fn function_args(&mut self) -> Result<Vec<Node>, SyntaxError> {
		self.expect(TokenKind::LeftParen, "\"(\"")?;
		let mut args = Vec::new();
		if self.eat(TokenKind::RightParen) {
			return Ok(args);
		}
		loop {
			args.push(self.expression()?);
			if !self.eat(TokenKind::Comma) {
				self.expect(TokenKind::RightParen, "\",\" or \")\"")?;
				return Ok(args);
			}
		}
	}

	// argument count is not checked: it's up to the evaluating side to decide whether argument list is valid or not
	pub(crate) fn function(&mut self) -> Result<Node, SyntaxError> {
		let name = self.bump().lexeme.clone();
		let args = self.function_args()?;
		Ok(Node::Function { name, args })
	}

	pub(crate) fn aggregation(&mut self, op: AggregationOp) -> Result<Node, SyntaxError> {
		let start = self.bump().clone();

		// both 'sum by (label, label) (foo)' and 'sum(foo) by (label, label)' are valid
		let mut aggregation = self.aggregation_mod()?;
		let args = self.function_args()?;
		if aggregation.is_none() {
			aggregation = self.aggregation_mod()?;
		}

		let arity = if op.takes_parameter() { 2 } else { 1 };
		if args.len() != arity {
			return Err(SyntaxError {
				position: start.position,
				expected: format!(
					"{} argument{} for {}",
					arity,
					if arity == 1 { "" } else { "s" },
					op.as_str(),
				),
				found: format!("{}", args.len()),
			});
		}

		Ok(Node::Aggregation { op, args, aggregation })
	}
}
