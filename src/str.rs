use nom::branch::alt;
use nom::bytes::complete::{is_not, take};
use nom::character::complete::char;
use nom::combinator::{map, map_opt, map_res, verify};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use crate::utils::IResult;

// String literals use Go escaping rules (https://golang.org/ref/spec#String_literals); label values are arbitrary Unicode.

// exactly `$len` digits in base `$radix`, as `$type`; `from_str_radix` is inherent on each integer type, hence the macro
macro_rules! fixed_length_radix {
	// :ident rather than :ty so that `$type::from_str_radix` stays a path
	($type:ident, $len:expr, $radix:expr) => {
		map_res(
			// from_str_radix alone would also take a leading `+`
			verify(take($len), |n: &str| n.chars().all(|c| c.is_digit($radix))),
			|n: &str| $type::from_str_radix(n, $radix),
		)
	};
}

// surrogates and code points past U+10FFFF are rejected, same as in Go
fn validate_unicode_scalar(n: u32) -> Option<Vec<u8>> {
	::std::char::from_u32(n).map(|c| {
		let mut tmp = [0; 4];
		c.encode_utf8(&mut tmp).as_bytes().to_vec()
	})
}

fn rune(input: &str) -> IResult<&str, Vec<u8>> {
	preceded(
		char('\\'),
		alt((
			// map() instead of value(): the latter would clone a Vec for every attempt
			map(char('a'), |_| vec![0x07]),
			map(char('b'), |_| vec![0x08]),
			map(char('f'), |_| vec![0x0c]),
			map(char('n'), |_| vec![0x0a]),
			map(char('r'), |_| vec![0x0d]),
			map(char('t'), |_| vec![0x09]),
			map(char('v'), |_| vec![0x0b]),
			map(char('\\'), |_| vec![0x5c]),
			map(char('\''), |_| vec![0x27]),
			map(char('"'), |_| vec![0x22]),
			map(fixed_length_radix!(u8, 3usize, 8), |n| vec![n]),
			map(
				preceded(char('x'), fixed_length_radix!(u8, 2usize, 16)),
				|n| vec![n],
			),
			map_opt(
				preceded(char('u'), fixed_length_radix!(u32, 4usize, 16)),
				validate_unicode_scalar,
			),
			map_opt(
				preceded(char('U'), fixed_length_radix!(u32, 8usize, 16)),
				validate_unicode_scalar,
			),
		)),
	)(input)
}

// run of chars outside of `arg`, as bytes so it can be concatenated with decoded escapes
fn is_not_v<'a>(arg: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<u8>> {
	map(is_not(arg), |s: &str| s.as_bytes().to_vec())
}

// plain chars (anything outside of `arg`) mixed with escapes
fn chars_except<'a>(arg: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<u8>> {
	map(many0(alt((rune, is_not_v(arg)))), |s| s.concat())
}

// escapes like `\xff` may produce arbitrary bytes; the result is checked for UTF-8 once the whole literal is decoded
fn string_bytes(input: &str) -> IResult<&str, Vec<u8>> {
	alt((
		// only backquoted literals may span lines
		delimited(char('"'), chars_except("\n\"\\"), char('"')),
		delimited(char('\''), chars_except("\n'\\"), char('\'')),
		// backquoted: no escapes at all
		delimited(char('`'), map(many0(is_not_v("`")), |s| s.concat()), char('`')),
	))(input)
}

/// Parses a quoted string literal and returns its decoded contents.
pub(crate) fn string(input: &str) -> IResult<&str, String> {
	map_res(string_bytes, String::from_utf8)(input)
}

/// Quotes `s` so that [`string`] decodes it back to the same value.
pub(crate) fn quote(s: &str) -> String {
	let mut out = String::with_capacity(s.len() + 2);
	out.push('"');
	for c in s.chars() {
		match c {
			'\\' => out.push_str("\\\\"),
			'"' => out.push_str("\\\""),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			c => out.push(c),
		}
	}
	out.push('"');
	out
}
