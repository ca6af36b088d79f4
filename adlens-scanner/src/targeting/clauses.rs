use super::primitives::{
    Parsed, first_phrase, literal, one_of, optional_literal, take_until, take_until_any,
};
use crate::model::{Target, TargetKind};

const UNTIL_B: &str = "</b>";

const ADVERTISER_OPENERS: &[&str] = &[
    "is that <b>",
    "is because <b>",
    r#"<b id="ad_prefs_advertiser">"#,
];

const RETARGETING_PHRASES: &[&str] = &[
    "people who may be similar to their customers",
    "Personen, die deren Kunden ähneln",
    "personer, som minder om deres kunder",
    "i nærheden af deres virksomhed for nylig",
    "kürzlich in der Nähe des Unternehmens",
    "nyss varit i närheten av företaget",
    "recently near their business",
];

const WEBSITE_PHRASE: &str = "people who have visited their website or used one of their apps";

const PROVIDER_OPENERS: &[&str] = &["based on data provided by", "wir basierend auf Daten von"];

const LIKE_PHRASES: &[&str] = &[
    "who like their",
    "whose friends like their",
    "Personen erreichen möchte, denen deren Seite gefällt.",
];

const LIST_PHRASE: &str = "added you to a list of people they want to reach on Facebook.";

const ACTIVITY_PHRASE: &str =
    "wants to reach people based on their activity on the Facebook family of apps and services";

const ENGAGED_PHRASES: &[&str] = &[
    "wants to reach people who engaged with them or their content.",
    "wants to reach people who have engaged with them or with their content",
];

const SEGMENT_OPENERS: &[&str] = &["„<b>", "<b>\"", "<b>„"];
const SEGMENT_CLOSERS: &[&str] = &["\"</b>", "</b>“", "“</b>"];

/// Gender words following an emphasis tag. `None` is the neutral "people"
/// form, which matches but produces no target.
const GENDER_WORDS: &[(&str, Option<&str>)] = &[
    ("men", Some("men")),
    ("Männer", Some("men")),
    ("mænd", Some("men")),
    ("gli uomini", Some("men")),
    ("män", Some("men")),
    ("women", Some("women")),
    ("Frauen", Some("women")),
    ("kvinder", Some("women")),
    ("people", None),
    ("Personen", None),
    ("personer", None),
    ("le persone", None),
];

/// "... because you are a woman ..." phrasing.
const GENDER_NOUNS: &[(&str, Option<&str>)] = &[
    ("woman", Some("women")),
    ("man", Some("men")),
    ("person", None),
];

type Clause = for<'a> fn(&'a str) -> Parsed<'a, Target>;

/// Where the targeting came from, in the order the alternatives are tried.
const SOURCES: &[Clause] = &[
    interest,
    retargeting,
    employer,
    school,
    website,
    provider,
    language,
    segment,
    like,
    list,
    activity,
];

pub(super) fn source(input: &str) -> Parsed<'_, Target> {
    SOURCES.iter().find_map(|clause| clause(input))
}

pub(super) fn advertiser_b(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until_any(input, ADVERTISER_OPENERS)?;
    let (name, rest) = take_until(rest, UNTIL_B)?;
    Some((Target::with_segment(TargetKind::Advertiser, name), rest))
}

pub(super) fn advertiser_wants(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, "including that ")?;
    let (name, rest) = take_until(rest, " wants to reach")?;
    Some((Target::with_segment(TargetKind::Advertiser, name), rest))
}

pub(super) fn engaged_with_content(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until_any(input, ENGAGED_PHRASES)?;
    Some((Target::new(TargetKind::EngagedWithContent), rest))
}

/// Mandatory in the main sentence form. Succeeds with `None` for the neutral
/// "people" wording.
pub(super) fn gender(input: &str) -> Parsed<'_, Option<Target>> {
    let emphasized = || {
        let (_, rest) = take_until(input, "<b>")?;
        one_of(rest, GENDER_WORDS)
    };
    let addressed = || {
        let (_, rest) = take_until(input, "you are a ")?;
        one_of(rest, GENDER_NOUNS)
    };
    let (word, rest) = emphasized().or_else(addressed)?;
    let target = word.map(|segment| Target::with_segment(TargetKind::Gender, segment));
    Some((target, rest))
}

fn interest(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, r#"<b id="ad_prefs_interest">"#)?;
    let (value, rest) = take_until(rest, UNTIL_B)?;
    Some((Target::with_segment(TargetKind::Interest, value), rest))
}

fn retargeting(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, "<b>")?;
    let (phrase, rest) = first_phrase(rest, RETARGETING_PHRASES)?;
    Some((Target::with_segment(TargetKind::Retargeting, phrase), rest))
}

fn employer(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, "Personen erreichen möchte, die <b>")?;
    let (value, rest) = take_until(rest, "</b> als Arbeitgeber")?;
    Some((Target::with_segment(TargetKind::Employer, value), rest))
}

fn school(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, "som har angivet skolen <b>")?;
    let (value, rest) = take_until(rest, "</b> på")?;
    Some((Target::with_segment(TargetKind::Employer, value), rest))
}

fn website(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, "wants to reach ")?;
    let rest = literal(rest, WEBSITE_PHRASE)?;
    Some((Target::with_segment(TargetKind::Website, WEBSITE_PHRASE), rest))
}

fn provider(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until_any(input, PROVIDER_OPENERS)?;
    let (_, rest) = take_until(rest, "<b>")?;
    let (agency, rest) = take_until(rest, UNTIL_B)?;
    Some((Target::with_segment(TargetKind::Agency, agency), rest))
}

fn language(input: &str) -> Parsed<'_, Target> {
    let german = || {
        let (_, rest) = take_until(input, "die <b>")?;
        take_until(rest, "</b> sprechen")
    };
    let english = || {
        let (_, rest) = take_until(input, "who speak <b>")?;
        let rest = optional_literal(rest, "\"");
        take_until(rest, "\"</b>").or_else(|| take_until(rest, UNTIL_B))
    };
    let (value, rest) = german().or_else(english)?;
    Some((Target::with_segment(TargetKind::Language, value), rest))
}

fn segment(input: &str) -> Parsed<'_, Target> {
    let emphasized = || {
        let (_, rest) = take_until_any(input, SEGMENT_OPENERS)?;
        take_until_any(rest, SEGMENT_CLOSERS)
    };
    let audience = |quote: &str| {
        let (_, rest) = take_until(input, &format!("an audience called {quote}"))?;
        take_until(rest, quote)
    };
    let (value, rest) = emphasized()
        .or_else(|| audience("'"))
        .or_else(|| audience("\""))?;
    Some((Target::with_segment(TargetKind::Segment, value), rest))
}

fn like(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until_any(input, LIKE_PHRASES)?;
    Some((Target::new(TargetKind::Like), rest))
}

fn list(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, LIST_PHRASE)?;
    Some((Target::new(TargetKind::List), rest))
}

fn activity(input: &str) -> Parsed<'_, Target> {
    let (_, rest) = take_until(input, ACTIVITY_PHRASE)?;
    Some((Target::new(TargetKind::Activity), rest))
}
