use std::fmt;
use crate::parser::SyntaxError;
use crate::scope::ScopeViolation;

const EXCERPT_LEN: usize = 16;

/// Query text that could not be split into tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
	/// Byte offset of the offending character.
	pub position: usize,
	/// Up to a few characters of the input, starting at `position`.
	pub excerpt: String,
	pub message: &'static str,
}

impl LexError {
	pub(crate) fn new(text: &str, position: usize, message: &'static str) -> LexError {
		LexError {
			position,
			excerpt: text[position..].chars().take(EXCERPT_LEN).collect(),
			message,
		}
	}
}

impl fmt::Display for LexError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} at position {} near `{}`", self.message, self.position, self.excerpt)
	}
}

impl std::error::Error for LexError {}

quick_error! {
	/// Any reason a query can not be parsed or confined to a scope.
	#[derive(Debug, Clone, PartialEq)]
	pub enum Error {
		Lex(err: LexError) {
			from()
			display("lexer error: {}", err)
			source(err)
		}
		Syntax(err: SyntaxError) {
			from()
			display("syntax error: {}", err)
			source(err)
		}
		Scope(err: ScopeViolation) {
			from()
			display("scope violation: {}", err)
			source(err)
		}
	}
}

impl Error {
	/// Whether the query itself is malformed, as opposed to well-formed but not allowed.
	pub fn is_malformed(&self) -> bool {
		matches!(self, Error::Lex(_) | Error::Syntax(_))
	}
}
