//! Grammar that turns a disclosure panel ("Why am I seeing this ad?") into
//! targeting attributes.
//!
//! The panel text still carries the `<b>` emphasis the host wraps around the
//! interesting values, and the grammar uses those tags as capture anchors.
//! Sentences that match no known template produce `None`; that is never an
//! error.

mod clauses;
mod demographics;
mod primitives;

use crate::model::{Disclosure, Target, TargetKind};
use primitives::{Parsed, literal};

/// Parses sanitised disclosure markup into the advertiser and its targets.
pub fn parse_disclosure(text: &str) -> Option<Disclosure> {
    let targets = full_sentence(text).or_else(|| engaged_sentence(text))?;
    if targets.is_empty() {
        return None;
    }

    let advertiser = targets
        .iter()
        .find(|target| target.kind == TargetKind::Advertiser)
        .and_then(|target| target.segment.clone());

    let targets = targets
        .into_iter()
        .filter(|target| target.kind != TargetKind::Advertiser)
        .filter(|target| !(target.kind == TargetKind::MaxAge && is_blank(&target.segment)))
        .collect();

    Some(Disclosure {
        advertiser,
        targets,
    })
}

fn is_blank(segment: &Option<String>) -> bool {
    segment.as_deref().is_none_or(str::is_empty)
}

/// advertiser? source? advertiser-wants? gender age-and-location closing
fn full_sentence(input: &str) -> Option<Vec<Target>> {
    let mut targets = Vec::new();

    let rest = optional(input, clauses::advertiser_b, &mut targets);
    let rest = optional(rest, clauses::source, &mut targets);
    let rest = optional(rest, clauses::advertiser_wants, &mut targets);

    let (gender, rest) = clauses::gender(rest)?;
    targets.extend(gender);

    let (location, rest) = demographics::age_and_location(rest);
    targets.extend(location);

    closing(rest)?;
    Some(targets)
}

/// advertiser? engaged? closing
fn engaged_sentence(input: &str) -> Option<Vec<Target>> {
    let mut targets = Vec::new();

    let rest = optional(input, clauses::advertiser_b, &mut targets);
    let rest = optional(rest, clauses::engaged_with_content, &mut targets);

    closing(rest)?;
    Some(targets)
}

fn optional<'a>(
    input: &'a str,
    clause: fn(&'a str) -> Parsed<'a, Target>,
    targets: &mut Vec<Target>,
) -> &'a str {
    match clause(input) {
        Some((target, rest)) => {
            targets.push(target);
            rest
        }
        None => input,
    }
}

/// The rest of the panel has to start at the closing ". This ..." sentence.
fn closing(input: &str) -> Option<()> {
    literal(input, ". This").map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_woman_region() {
        let text = "Foo Bar wants to reach people who like their Page. This is because you are a woman between 25 and 34 years old who live in <b>United States</b>. This ad ran...";
        let disclosure = parse_disclosure(text).unwrap();

        assert_eq!(disclosure.advertiser, None);
        let targets = &disclosure.targets;
        assert!(targets.contains(&Target::new(TargetKind::Like)));
        assert!(targets.contains(&Target::with_segment(TargetKind::Gender, "women")));
        assert!(targets.contains(&Target::with_segment(TargetKind::MinAge, "25")));
        assert!(targets.contains(&Target::with_segment(TargetKind::MaxAge, "34")));
        assert!(targets.contains(&Target::with_segment(TargetKind::Region, "United States")));
    }

    #[test]
    fn test_prose_is_not_targeting() {
        assert_eq!(parse_disclosure("The quick brown fox jumps over the lazy dog."), None);
        assert_eq!(parse_disclosure(""), None);
    }

    #[test]
    fn test_closing_without_clauses_is_none() {
        assert_eq!(parse_disclosure(". This is all we know."), None);
    }

    #[test]
    fn test_engaged_with_content() {
        let text = "One reason you're seeing this ad is that <b>Acme</b> wants to reach people who have engaged with them or with their content. This is based on your activity.";
        let disclosure = parse_disclosure(text).unwrap();
        assert_eq!(disclosure.advertiser.as_deref(), Some("Acme"));
        assert_eq!(disclosure.targets, vec![Target::new(TargetKind::EngagedWithContent)]);
    }

    #[test]
    fn test_interest_with_open_ended_age() {
        let text = r#"One reason you're seeing this ad is that <b id="ad_prefs_advertiser">Acme Outdoors</b> wants to reach people interested in <b id="ad_prefs_interest">Hiking</b>, based on activity such as liking Pages. There may be other reasons you're seeing this ad, including that Acme Outdoors wants to reach <b>people ages 18 and older</b> who live in <b>Norway</b>. This is information based on your Facebook profile."#;
        let disclosure = parse_disclosure(text).unwrap();

        assert_eq!(disclosure.advertiser.as_deref(), Some("Acme Outdoors"));
        let targets = &disclosure.targets;
        assert!(targets.contains(&Target::with_segment(TargetKind::Interest, "Hiking")));
        assert!(targets.contains(&Target::with_segment(TargetKind::MinAge, "18")));
        assert!(targets.contains(&Target::with_segment(TargetKind::Region, "Norway")));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::MaxAge));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::Gender));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::Advertiser));
    }

    #[test]
    fn test_and_younger_keeps_no_bounds() {
        let text = "Acme wants to reach people who like their Page. This is because you are a man between 13 and younger, who live in <b>Spain</b>. This ad ran.";
        let disclosure = parse_disclosure(text).unwrap();
        let targets = &disclosure.targets;
        assert!(targets.contains(&Target::with_segment(TargetKind::Gender, "men")));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::MinAge));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::MaxAge));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "Foo wants to reach <b>women aged 30</b> who live near <b>Aarhus</b>, <b>Midtjylland</b>. This is it.";
        assert_eq!(parse_disclosure(text), parse_disclosure(text));
        assert!(parse_disclosure(text).is_some());
    }
}
