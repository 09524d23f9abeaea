use crate::functions::{AggregationMod, AggregationOp};
use crate::lexer::{Keyword, Token, TokenKind};
use crate::parser::{Parser, SyntaxError};
use crate::vec::{Duration, InstantSelector, MatrixSelector, Resolution};

/// PromQL binary operators
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Op {
	/** `^` */
	Pow,

	/** `*` */
	Mul,
	/** `/` */
	Div,
	/** `%` */
	Mod,

	/** `+` */
	Plus,
	/** `-` */
	Minus,

	/** `==` */
	Eq,
	/** `!=` */
	Ne,
	/** `<` */
	Lt,
	/** `>` */
	Gt,
	/** `<=` */
	Le,
	/** `>=` */
	Ge,

	/** `and` */
	And,
	/** `unless` */
	Unless,

	/** `or` */
	Or,
}

impl Op {
	fn from_token(kind: TokenKind) -> Option<Op> {
		Some(match kind {
			TokenKind::Pow => Op::Pow,
			TokenKind::Mul => Op::Mul,
			TokenKind::Div => Op::Div,
			TokenKind::Mod => Op::Mod,
			TokenKind::Add => Op::Plus,
			TokenKind::Sub => Op::Minus,
			TokenKind::Eql => Op::Eq,
			TokenKind::Neq => Op::Ne,
			TokenKind::Lss => Op::Lt,
			TokenKind::Gtr => Op::Gt,
			TokenKind::Lte => Op::Le,
			TokenKind::Gte => Op::Ge,
			TokenKind::Keyword(Keyword::And) => Op::And,
			TokenKind::Keyword(Keyword::Unless) => Op::Unless,
			TokenKind::Keyword(Keyword::Or) => Op::Or,
			_ => return None,
		})
	}

	/// Binding strength; higher binds tighter.
	pub fn precedence(self) -> u8 {
		match self {
			Op::Or => 1,
			Op::And | Op::Unless => 2,
			Op::Eq | Op::Ne | Op::Lt | Op::Gt | Op::Le | Op::Ge => 3,
			Op::Plus | Op::Minus => 4,
			Op::Mul | Op::Div | Op::Mod => 5,
			Op::Pow => 6,
		}
	}

	/// `a ^ b ^ c` is `a ^ (b ^ c)`; every other operator groups to the left.
	pub fn is_right_associative(self) -> bool {
		self == Op::Pow
	}

	/// Comparison operators, the only ones that accept the `bool` modifier.
	pub fn is_comparison(self) -> bool {
		self.precedence() == 3
	}

	/// `and`, `or` and `unless`, which match many-to-many and can not be grouped.
	pub fn is_set_operator(self) -> bool {
		matches!(self, Op::And | Op::Or | Op::Unless)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Op::Pow => "^",
			Op::Mul => "*",
			Op::Div => "/",
			Op::Mod => "%",
			Op::Plus => "+",
			Op::Minus => "-",
			Op::Eq => "==",
			Op::Ne => "!=",
			Op::Lt => "<",
			Op::Gt => ">",
			Op::Le => "<=",
			Op::Ge => ">=",
			Op::And => "and",
			Op::Unless => "unless",
			Op::Or => "or",
		}
	}
}

/// Unary sign, e.g. `-b` in `a + -b`
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum UnaryOp {
	Plus,
	Minus,
}

impl UnaryOp {
	pub fn as_str(self) -> &'static str {
		match self {
			UnaryOp::Plus => "+",
			UnaryOp::Minus => "-",
		}
	}
}

#[derive(Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum OpModAction {
	RestrictTo,
	Ignore,
}
/// Vector matching operator modifier (`on (…)`/`ignoring (…)`).
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct OpMod {
	/// Action applied to a list of labels; whether `on (…)` or `ignoring (…)` is used after the operator.
	pub action: OpModAction,
	/// Set of labels to apply `action` to.
	pub labels: Vec<String>,
	/// Additional grouping modifier, if any.
	pub group: Option<OpGroupMod>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum OpGroupSide {
	Left,
	Right,
}
/// Vector grouping operator modifier (`group_left(…)`/`group_right(…)`).
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub struct OpGroupMod {
	pub side: OpGroupSide,
	pub labels: Vec<String>,
}

/// AST node.
#[derive(Debug, PartialEq, Clone)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Node {
	/// Operator: `a + ignoring (foo) b`
	Operator {
		/// First operand.
		x: Box<Node>,
		/// Operator itself.
		op: Op,
		/// Second operand.
		y: Box<Node>,
		/// Whether comparison returns 0/1 instead of filtering (`> bool`).
		bool_modifier: bool,
		/// Vector matching modifier, if any.
		matching: Option<OpMod>,
	},
	/// Unary sign.
	Unary {
		op: UnaryOp,
		x: Box<Node>,
	},
	/// Aggregation operator: `sum(foo) by (bar)`
	Aggregation {
		op: AggregationOp,
		/// Parameter (for e.g. `topk`), then the aggregated expression.
		args: Vec<Node>,
		/// Aggregation operator modifiers (`by(…)`/`without(…)`).
		aggregation: Option<AggregationMod>,
	},
	/// Function call.
	Function {
		/// Function name.
		name: String,
		/// Function arguments.
		args: Vec<Node>,
	},
	/// Instant vector selector.
	Vector(InstantSelector),
	/// Range vector selector.
	Matrix(MatrixSelector),
	/// Subquery: `rate(foo[1m])[1h:5m]`
	Subquery {
		x: Box<Node>,
		range: Duration,
		resolution: Resolution,
	},
	/// `… offset 5m`
	Offset {
		x: Box<Node>,
		offset: Duration,
	},
	/// Parenthesized expression; kept in the tree so the query renders back the way it was written.
	Paren(Box<Node>),
	/// Floating point number.
	Scalar(f64),
	/// String literal.
	String(String),
}
impl Node {
	// these functions are here primarily to avoid explicit mention of `Box::new()` in the code

	pub fn operator(x: Node, op: Op, y: Node) -> Node {
		Node::Operator {
			x: Box::new(x),
			op,
			y: Box::new(y),
			bool_modifier: false,
			matching: None,
		}
	}
	pub fn unary(op: UnaryOp, x: Node) -> Node {
		Node::Unary {
			op,
			x: Box::new(x),
		}
	}
	pub fn paren(x: Node) -> Node {
		Node::Paren(Box::new(x))
	}
}

fn scalar(token: &Token) -> Result<f64, SyntaxError> {
	let lexeme = token.lexeme.as_str();
	if lexeme.eq_ignore_ascii_case("inf") {
		Ok(f64::INFINITY)
	} else if lexeme.eq_ignore_ascii_case("nan") {
		Ok(f64::NAN)
	} else {
		lexeme
			.parse()
			.map_err(|_| SyntaxError::new(token, "a valid number"))
	}
}

impl<'t> Parser<'t> {
	pub(crate) fn expression(&mut self) -> Result<Node, SyntaxError> {
		self.nested(|p| p.binary(0))
	}

	// precedence climbing: foo op bar op baz → Node[Node[foo op bar] op baz], unless op is right-associative
	fn binary(&mut self, min_precedence: u8) -> Result<Node, SyntaxError> {
		self.chained(|p| p.binary_chain(min_precedence))
	}

	// every operator folded into `x` makes the tree one level deeper
	fn binary_chain(&mut self, min_precedence: u8) -> Result<Node, SyntaxError> {
		let mut x = self.unary()?;
		while let Some(op) = Op::from_token(self.peek_kind()) {
			if op.precedence() < min_precedence {
				break;
			}
			self.deepen()?;
			self.bump();

			let bool_modifier = self.peek_kind() == TokenKind::Keyword(Keyword::Bool);
			if bool_modifier {
				if !op.is_comparison() {
					return Err(self.unexpected("an expression (bool is only valid after comparisons)"));
				}
				self.bump();
			}
			let matching = self.op_modifier(op)?;

			let next = if op.is_right_associative() {
				op.precedence()
			} else {
				op.precedence() + 1
			};
			let y = self.nested(|p| p.binary(next))?;

			x = Node::Operator {
				x: Box::new(x),
				op,
				y: Box::new(y),
				bool_modifier,
				matching,
			};
		}
		Ok(x)
	}

	fn op_modifier(&mut self, op: Op) -> Result<Option<OpMod>, SyntaxError> {
		let action = match self.peek_kind() {
			TokenKind::Keyword(Keyword::On) => OpModAction::RestrictTo,
			TokenKind::Keyword(Keyword::Ignoring) => OpModAction::Ignore,
			_ => return Ok(None),
		};
		self.bump();
		let labels = self.label_list()?;

		// > Grouping modifiers can only be used for comparison and arithmetic.
		let side = match self.peek_kind() {
			TokenKind::Keyword(Keyword::GroupLeft) => Some(OpGroupSide::Left),
			TokenKind::Keyword(Keyword::GroupRight) => Some(OpGroupSide::Right),
			_ => None,
		};
		let group = match side {
			Some(_) if op.is_set_operator() => {
				return Err(self.unexpected(format!("an expression (no grouping for {})", op.as_str())));
			}
			Some(side) => {
				self.bump();
				let labels = if self.peek_kind() == TokenKind::LeftParen {
					self.label_list()?
				} else {
					vec![]
				};
				Some(OpGroupMod { side, labels })
			}
			None => None,
		};

		Ok(Some(OpMod { action, labels, group }))
	}

	// unary signs bind tighter than anything binary, `^` included
	fn unary(&mut self) -> Result<Node, SyntaxError> {
		let op = match self.peek_kind() {
			TokenKind::Add => UnaryOp::Plus,
			TokenKind::Sub => UnaryOp::Minus,
			_ => return self.postfix(),
		};
		self.bump();
		let x = self.nested(|p| p.unary())?;
		Ok(Node::unary(op, x))
	}

	pub(crate) fn atom(&mut self) -> Result<Node, SyntaxError> {
		let token = self.peek().clone();
		match token.kind {
			TokenKind::Number => {
				self.bump();
				Ok(Node::Scalar(scalar(&token)?))
			}
			TokenKind::String => {
				self.bump();
				Ok(Node::String(token.lexeme))
			}
			TokenKind::LeftParen => {
				self.bump();
				let x = self.expression()?;
				self.expect(TokenKind::RightParen, "\")\"")?;
				Ok(Node::paren(x))
			}
			TokenKind::Aggregation(op) => self.aggregation(op),
			TokenKind::Function => self.function(),
			TokenKind::Identifier | TokenKind::MetricIdentifier
				if self.peek_nth(1).kind == TokenKind::LeftParen =>
			{
				Err(SyntaxError::new(&token, "a known function or aggregation"))
			}
			TokenKind::Identifier | TokenKind::MetricIdentifier | TokenKind::LeftBrace => {
				Ok(Node::Vector(self.instant_selector()?))
			}
			_ => Err(SyntaxError::new(&token, "expression")),
		}
	}
}
