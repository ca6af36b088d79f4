use super::primitives::{
    Parsed, digits, first_phrase, literal, opt_ws, optional_literal, strip_emphasis, take_until,
    take_until_any,
};
use crate::model::{Target, TargetKind};

const AGE_OPENERS: &[&str] = &[
    "zwischen",
    "im Alter von",
    "i alderen",
    "i åldern",
    "på",
    "di età",
    "between",
];

const AGE_CLOSERS: &[&str] = &["derover", "älter", "die in", "che vivono", " years old", ","];

const CITY_OPENERS: &[&str] = &["near ", "in", "af"];

enum MaxAge<'a> {
    /// "and older"
    Open,
    Exact(&'a str),
    Unspecified,
}

/// Optional age expression followed by an optional location. Never fails; an
/// unmatched age consumes nothing.
pub(super) fn age_and_location(input: &str) -> (Vec<Target>, &str) {
    let mut targets = Vec::new();

    let rest = match age(opt_ws(input)) {
        Some((text, rest)) => {
            let text = strip_emphasis(text);
            targets.extend(min_max_age(&text).unwrap_or_default());
            targets.insert(0, Target::with_segment(TargetKind::Age, text));
            opt_ws(rest)
        }
        None => input,
    };

    match city_state(rest).or_else(|| region(rest)) {
        Some((location, rest)) => {
            targets.extend(location);
            (targets, rest)
        }
        None => (targets, rest),
    }
}

/// Captures the raw age text, e.g. "25 and 34" or "18 and older".
fn age(input: &str) -> Parsed<'_, &str> {
    let between = || {
        let (_, rest) = first_phrase(input, AGE_OPENERS)?;
        take_until_any(opt_ws(rest), AGE_CLOSERS)
    };
    let aged = || {
        let rest = opt_ws(literal(input, "age")?);
        let rest = opt_ws(optional_literal(rest, "s"));
        let rest = opt_ws(optional_literal(rest, "d"));
        take_until(rest, " who").or_else(|| take_until(rest, "</b>"))
    };
    between().or_else(aged)
}

/// Splits age text into bounds. The whole text has to be accounted for,
/// otherwise no bounds are produced ("18 and younger" yields neither).
fn min_max_age(text: &str) -> Option<Vec<Target>> {
    let (min, rest) = digits(opt_ws(text));
    let (max, rest) = max_age(opt_ws(rest));
    if !rest.trim().is_empty() {
        return None;
    }

    let mut targets = Vec::new();
    if !min.is_empty() {
        targets.push(Target::with_segment(TargetKind::MinAge, min));
    }
    match max {
        MaxAge::Open => targets.push(Target::new(TargetKind::MaxAge)),
        MaxAge::Exact(age) => targets.push(Target::with_segment(TargetKind::MaxAge, age)),
        MaxAge::Unspecified if !min.is_empty() => {
            targets.push(Target::with_segment(TargetKind::MaxAge, min))
        }
        MaxAge::Unspecified => {}
    }
    Some(targets)
}

fn max_age(input: &str) -> (MaxAge<'_>, &str) {
    let older = || {
        let (_, rest) = take_until(input, "and ")?;
        let rest = literal(opt_ws(rest), "older")?;
        Some((MaxAge::Open, rest))
    };
    let upto = || {
        let (_, rest) = take_until(input, "to ")?;
        let (age, rest) = digits(opt_ws(rest));
        Some((MaxAge::Exact(age), rest))
    };
    let and_upper = || {
        let (_, rest) = take_until(input, "and ")?;
        let (age, rest) = digits(opt_ws(rest));
        (!age.is_empty()).then_some((MaxAge::Exact(age), rest))
    };
    older()
        .or_else(upto)
        .or_else(and_upper)
        .unwrap_or((MaxAge::Unspecified, input))
}

fn region(input: &str) -> Parsed<'_, Vec<Target>> {
    let rest = opt_ws(optional_literal(opt_ws(input), "who"));
    let rest = literal(rest, "live").or_else(|| literal(rest, "were recently"))?;
    let (_, rest) = take_until(opt_ws(rest), "in")?;
    let rest = optional_literal(opt_ws(rest), "<b>");
    let (country, rest) = take_until(rest, "</b>")?;
    Some((vec![Target::with_segment(TargetKind::Region, country)], rest))
}

fn city_state(input: &str) -> Parsed<'_, Vec<Target>> {
    let (_, rest) = take_until_any(opt_ws(input), CITY_OPENERS)?;
    let (city, rest) = take_until(opt_ws(rest), ",")?;
    let rest = optional_literal(opt_ws(rest), "<b>");
    let (state, rest) = take_until(rest, "wohnen oder").or_else(|| take_until(rest, "</b>"))?;
    let targets = vec![
        Target::with_segment(TargetKind::City, strip_emphasis(city)),
        Target::with_segment(TargetKind::State, strip_emphasis(state)),
    ];
    Some((targets, rest))
}
