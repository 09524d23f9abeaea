use nom::branch::alt;
use nom::character::complete::{
	char,
	multispace1,
	not_line_ending,
};
use nom::combinator::{
	fail,
	recognize,
};
use nom::multi::many0;
use nom::sequence::pair;
use crate::ParserOptions;
use crate::utils::{
	IResult,
	value,
};

/// Skips any run of whitespace and, if enabled, `#` comments that span to the end of the line.
pub(crate) fn ws_or_comment<'a>(opts: ParserOptions) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
	value(
		many0(alt((
			move |input: &'a str| -> IResult<&'a str, &'a str> {
				if opts.comments {
					recognize(pair(
						char('#'),
						not_line_ending,
					))(input)
				} else {
					fail(input)
				}
			},
			multispace1,
		))),
		(),
	)
}
