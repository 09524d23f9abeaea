use nom::Parser;

pub(crate) type IResult<I, O> = nom::IResult<I, O, nom::error::Error<I>>;

/// Like `nom::combinator::value`, but with the parser first: reads better in long `alt()` tables.
pub(crate) fn value<I, O1, O2, P>(mut parser: P, val: O2) -> impl FnMut(I) -> IResult<I, O2>
where
	P: Parser<I, O1, nom::error::Error<I>>,
	O2: Clone,
{
	move |input| parser.parse(input).map(|(rest, _)| (rest, val.clone()))
}

/// Characters that may continue (but not necessarily start) a label name.
pub(crate) fn is_label_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

/// Characters that may start a label or a metric name.
pub(crate) fn is_name_start(c: char) -> bool {
	c.is_ascii_alphabetic() || c == '_'
}
