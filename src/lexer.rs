use std::collections::HashMap;
use std::fmt;
use nom::branch::alt;
use nom::bytes::complete::{
	tag,
	take_while,
};
use nom::character::complete::{
	char,
	digit0,
	digit1,
	one_of,
	satisfy,
};
use nom::combinator::{
	consumed,
	map,
	not,
	opt,
	peek,
	recognize,
};
use nom::sequence::{
	pair,
	terminated,
	tuple,
};
use once_cell::sync::Lazy;
use crate::ParserOptions;
use crate::error::LexError;
use crate::functions::{AggregationOp, FUNCTIONS};
use crate::str::string;
use crate::utils::{
	IResult,
	is_label_char,
	is_name_start,
	value,
};
use crate::whitespace::ws_or_comment;

/// Reserved words that are neither functions nor aggregation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serializable", derive(serde_derive::Serialize, serde_derive::Deserialize))]
pub enum Keyword {
	And,
	Or,
	Unless,
	By,
	Without,
	On,
	Ignoring,
	GroupLeft,
	GroupRight,
	Offset,
	Bool,
}

impl Keyword {
	pub const ALL: &'static [Keyword] = &[
		Keyword::And,
		Keyword::Or,
		Keyword::Unless,
		Keyword::By,
		Keyword::Without,
		Keyword::On,
		Keyword::Ignoring,
		Keyword::GroupLeft,
		Keyword::GroupRight,
		Keyword::Offset,
		Keyword::Bool,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Keyword::And => "and",
			Keyword::Or => "or",
			Keyword::Unless => "unless",
			Keyword::By => "by",
			Keyword::Without => "without",
			Keyword::On => "on",
			Keyword::Ignoring => "ignoring",
			Keyword::GroupLeft => "group_left",
			Keyword::GroupRight => "group_right",
			Keyword::Offset => "offset",
			Keyword::Bool => "bool",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	Number,
	/// Quoted string; the token's lexeme holds the decoded contents, without quotes.
	String,
	Duration,
	/// Name that is valid both as a metric name and as a label name.
	Identifier,
	/// Name that is only valid as a metric name (contains `:`, or `.` when periods are allowed).
	MetricIdentifier,
	Keyword(Keyword),
	Aggregation(AggregationOp),
	Function,

	Add,
	Sub,
	Mul,
	Div,
	Mod,
	Pow,
	Eql,
	Neq,
	Gtr,
	Lss,
	Gte,
	Lte,
	Assign,
	EqlRegex,
	NeqRegex,

	LeftParen,
	RightParen,
	LeftBrace,
	RightBrace,
	LeftBracket,
	RightBracket,
	Comma,
	Colon,

	Eof,
}

impl TokenKind {
	/// Whether a token of this kind may be used as a label name.
	pub fn is_label_name(self) -> bool {
		matches!(
			self,
			TokenKind::Identifier
				| TokenKind::Keyword(_)
				| TokenKind::Aggregation(_)
				| TokenKind::Function
		)
	}
}

/// Single lexeme together with its byte offset in the query text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
	pub kind: TokenKind,
	pub lexeme: String,
	pub position: usize,
}

impl Token {
	fn eof(position: usize) -> Token {
		Token {
			kind: TokenKind::Eof,
			lexeme: String::new(),
			position,
		}
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.kind {
			TokenKind::Eof => write!(f, "end of input"),
			TokenKind::String => write!(f, "string {}", crate::str::quote(&self.lexeme)),
			TokenKind::Number => write!(f, "number {}", self.lexeme),
			TokenKind::Duration => write!(f, "duration {}", self.lexeme),
			_ => write!(f, "\"{}\"", self.lexeme),
		}
	}
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
	let mut table = HashMap::new();
	for kw in Keyword::ALL {
		table.insert(kw.as_str(), TokenKind::Keyword(*kw));
	}
	for op in AggregationOp::ALL {
		table.insert(op.as_str(), TokenKind::Aggregation(*op));
	}
	for name in FUNCTIONS {
		table.insert(*name, TokenKind::Function);
	}
	table
});

// durations are checked before numbers: `5m` is a duration, `5` followed by `m_total` is not
fn duration(input: &str) -> IResult<&str, &str> {
	terminated(
		recognize(pair(digit1, one_of("smhdwy"))),
		not(satisfy(is_label_char)),
	)(input)
}

fn number(input: &str) -> IResult<&str, &str> {
	recognize(tuple((
		alt((
			recognize(pair(digit1, opt(pair(char('.'), digit0)))),
			recognize(pair(char('.'), digit1)),
		)),
		opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
	)))(input)
}

// > The metric name … must match the regex [a-zA-Z_:][a-zA-Z0-9_:]*.
// > Label names … must match the regex [a-zA-Z_][a-zA-Z0-9_]*.
// a leading `:` is only a name if something name-like follows, otherwise it's the subquery colon in `[5m:1m]`
fn identifier<'a>(opts: ParserOptions) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
	recognize(pair(
		alt((
			recognize(satisfy(is_name_start)),
			recognize(terminated(
				char(':'),
				peek(satisfy(|c| is_name_start(c) || c == ':')),
			)),
		)),
		take_while(move |c: char| is_label_char(c) || c == ':' || (opts.allow_periods && c == '.')),
	))
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
	alt((
		// two-char operators go first
		alt((
			value(tag("=="), TokenKind::Eql),
			value(tag("!="), TokenKind::Neq),
			value(tag("=~"), TokenKind::EqlRegex),
			value(tag("!~"), TokenKind::NeqRegex),
			value(tag(">="), TokenKind::Gte),
			value(tag("<="), TokenKind::Lte),
			value(char('='), TokenKind::Assign),
			value(char('>'), TokenKind::Gtr),
			value(char('<'), TokenKind::Lss),
		)),
		alt((
			value(char('+'), TokenKind::Add),
			value(char('-'), TokenKind::Sub),
			value(char('*'), TokenKind::Mul),
			value(char('/'), TokenKind::Div),
			value(char('%'), TokenKind::Mod),
			value(char('^'), TokenKind::Pow),
			value(char('('), TokenKind::LeftParen),
			value(char(')'), TokenKind::RightParen),
			value(char('{'), TokenKind::LeftBrace),
			value(char('}'), TokenKind::RightBrace),
			value(char('['), TokenKind::LeftBracket),
			value(char(']'), TokenKind::RightBracket),
			value(char(','), TokenKind::Comma),
			value(char(':'), TokenKind::Colon),
		)),
	))(input)
}

fn classify(name: &str) -> TokenKind {
	if name.contains(|c: char| c == ':' || c == '.') {
		TokenKind::MetricIdentifier
	} else if name.eq_ignore_ascii_case("inf") || name.eq_ignore_ascii_case("nan") {
		TokenKind::Number
	} else {
		KEYWORDS.get(name).copied().unwrap_or(TokenKind::Identifier)
	}
}

fn token<'a>(opts: ParserOptions) -> impl FnMut(&'a str) -> IResult<&'a str, (TokenKind, String)> {
	alt((
		map(string, |s| (TokenKind::String, s)),
		map(duration, |d| (TokenKind::Duration, d.to_string())),
		map(number, |n| (TokenKind::Number, n.to_string())),
		map(identifier(opts), |name| (classify(name), name.to_string())),
		map(consumed(operator), |(lexeme, kind)| (kind, lexeme.to_string())),
	))
}

/**
Splits query text into tokens.

Whitespace (and comments, if enabled) is dropped. The returned sequence always ends with a [`TokenKind::Eof`] token positioned at the end of the text.
*/
pub fn tokenize(text: &str, opts: ParserOptions) -> Result<Vec<Token>, LexError> {
	let mut skip = ws_or_comment(opts);
	let mut next = token(opts);
	let mut tokens = Vec::new();
	let mut rest = text;

	loop {
		if let Ok((tail, ())) = skip(rest) {
			rest = tail;
		}
		let position = text.len() - rest.len();
		if rest.is_empty() {
			tokens.push(Token::eof(position));
			return Ok(tokens);
		}

		match next(rest) {
			Ok((tail, (kind, lexeme))) => {
				tokens.push(Token { kind, lexeme, position });
				rest = tail;
			}
			Err(_) => {
				let message = if rest.starts_with(&['"', '\'', '`'][..]) {
					"unterminated or malformed string literal"
				} else {
					"unexpected character"
				};
				return Err(LexError::new(text, position, message));
			}
		}
	}
}
