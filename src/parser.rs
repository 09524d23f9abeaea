use std::fmt;
use crate::ParserOptions;
use crate::expr::Node;
use crate::lexer::{Token, TokenKind};

/// Token sequence that does not follow the grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
	/// Byte offset of the offending token in the query text.
	pub position: usize,
	/// What would have been accepted at `position`.
	pub expected: String,
	/// Description of the token that was there instead.
	pub found: String,
}

impl SyntaxError {
	pub(crate) fn new<E: Into<String>>(token: &Token, expected: E) -> SyntaxError {
		SyntaxError {
			position: token.position,
			expected: expected.into(),
			found: token.to_string(),
		}
	}

	/// Whether the query ended before it was complete.
	pub fn is_at_end(&self) -> bool {
		self.found == END_OF_INPUT
	}
}

const END_OF_INPUT: &str = "end of input";

impl fmt::Display for SyntaxError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "expected {}, found {} at position {}", self.expected, self.found, self.position)
	}
}

impl std::error::Error for SyntaxError {}

/// Cursor over a token sequence; the grammar productions live in `expr`, `vec` and `functions`.
pub(crate) struct Parser<'t> {
	tokens: &'t [Token],
	pos: usize,
	depth: usize,
	pub(crate) opts: ParserOptions,
	eof: Token,
}

impl<'t> Parser<'t> {
	pub(crate) fn new(tokens: &'t [Token], opts: ParserOptions) -> Parser<'t> {
		let end = tokens
			.last()
			.map(|t| t.position + t.lexeme.len())
			.unwrap_or(0);
		Parser {
			tokens,
			pos: 0,
			depth: 0,
			opts,
			eof: Token {
				kind: TokenKind::Eof,
				lexeme: String::new(),
				position: end,
			},
		}
	}

	pub(crate) fn peek(&self) -> &Token {
		self.peek_nth(0)
	}

	pub(crate) fn peek_nth(&self, n: usize) -> &Token {
		self.tokens.get(self.pos + n).unwrap_or(&self.eof)
	}

	pub(crate) fn peek_kind(&self) -> TokenKind {
		self.peek().kind
	}

	/// Consumes the current token; the end-of-input token is never consumed.
	pub(crate) fn bump(&mut self) -> &Token {
		let at = self.pos;
		if self.peek_kind() != TokenKind::Eof {
			self.pos += 1;
		}
		self.tokens.get(at).unwrap_or(&self.eof)
	}

	pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
		if self.peek_kind() == kind {
			self.bump();
			true
		} else {
			false
		}
	}

	pub(crate) fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&Token, SyntaxError> {
		if self.peek_kind() == kind {
			Ok(self.bump())
		} else {
			Err(self.unexpected(expected))
		}
	}

	pub(crate) fn unexpected<E: Into<String>>(&self, expected: E) -> SyntaxError {
		SyntaxError::new(self.peek(), expected)
	}

	/// Runs `production` one nesting level deeper, failing once `max_depth` is exceeded.
	pub(crate) fn nested<T, F>(&mut self, production: F) -> Result<T, SyntaxError>
	where
		F: FnOnce(&mut Self) -> Result<T, SyntaxError>,
	{
		self.chained(|p| {
			p.deepen()?;
			production(p)
		})
	}

	/// Runs `production`, which may [`deepen`](Self::deepen) any number of times, then restores the nesting level.
	pub(crate) fn chained<T, F>(&mut self, production: F) -> Result<T, SyntaxError>
	where
		F: FnOnce(&mut Self) -> Result<T, SyntaxError>,
	{
		let depth = self.depth;
		let result = production(self);
		self.depth = depth;
		result
	}

	/// Counts one more level of the tree being built, for trees that grow in a loop rather than by recursion.
	pub(crate) fn deepen(&mut self) -> Result<(), SyntaxError> {
		if self.depth >= self.opts.max_depth {
			return Err(self.unexpected("a less deeply nested expression"));
		}
		self.depth += 1;
		Ok(())
	}
}

/**
Builds an AST out of a token sequence produced by [`tokenize`](crate::tokenize).

The whole sequence has to form a single expression; nothing is returned on failure.
*/
pub fn parse_tokens(tokens: &[Token], opts: ParserOptions) -> Result<Node, SyntaxError> {
	let mut parser = Parser::new(tokens, opts);
	let node = parser.expression()?;
	parser.expect(TokenKind::Eof, "an operator or end of input")?;
	Ok(node)
}
