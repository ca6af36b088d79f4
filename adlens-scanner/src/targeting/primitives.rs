//! Parser primitives for the disclosure grammar.
//!
//! Every parser takes the remaining input and returns what it produced
//! together with the input left over, or `None` when it does not match.
//! Alternatives are tried in list order and the first match wins; nothing
//! backtracks into a parser that already succeeded.

pub(crate) type Parsed<'a, T> = Option<(T, &'a str)>;

pub(crate) fn literal<'a>(input: &'a str, phrase: &str) -> Option<&'a str> {
    input.strip_prefix(phrase)
}

/// Consumes `phrase` when it is next, otherwise consumes nothing.
pub(crate) fn optional_literal<'a>(input: &'a str, phrase: &str) -> &'a str {
    literal(input, phrase).unwrap_or(input)
}

/// Scans forward to the first occurrence of `delimiter`, returning what came
/// before it. The delimiter itself is consumed.
pub(crate) fn take_until<'a>(input: &'a str, delimiter: &str) -> Parsed<'a, &'a str> {
    let at = input.find(delimiter)?;
    Some((&input[..at], &input[at + delimiter.len()..]))
}

/// Ordered alternation of `take_until`: the first delimiter in the list that
/// occurs anywhere wins, even if a later one occurs earlier in the input.
pub(crate) fn take_until_any<'a>(input: &'a str, delimiters: &[&str]) -> Parsed<'a, &'a str> {
    delimiters
        .iter()
        .find_map(|delimiter| take_until(input, delimiter))
}

/// Ordered alternation of literals, yielding the phrase that matched.
pub(crate) fn first_phrase<'a, 'p>(input: &'a str, phrases: &[&'p str]) -> Parsed<'a, &'p str> {
    phrases
        .iter()
        .find_map(|phrase| literal(input, phrase).map(|rest| (*phrase, rest)))
}

/// Ordered alternation of literals, yielding the value paired with the
/// phrase that matched.
pub(crate) fn one_of<'a, T: Copy>(input: &'a str, table: &[(&str, T)]) -> Parsed<'a, T> {
    table
        .iter()
        .find_map(|(phrase, value)| literal(input, phrase).map(|rest| (*value, rest)))
}

pub(crate) fn opt_ws(input: &str) -> &str {
    input.trim_start()
}

/// ASCII digits, possibly none.
pub(crate) fn digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

/// Drops bold-emphasis tags left around a captured value.
pub(crate) fn strip_emphasis(value: &str) -> String {
    value.replace("<b>", "").replace("</b>", "").trim().to_string()
}
