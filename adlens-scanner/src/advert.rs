use crate::model::AdRecord;
use crate::sanitize;
use scraper::{Html, Selector};

const TITLE_SELECTOR: &str = "h5 a, h6 a, strong, span.fsl";
const MESSAGE_SELECTORS: &[&str] = &[".userContent p", "div.mbs", "span"];
const PAGE_SELECTOR: &str = ".fwb a";

/// Builds the visible part of an ad record from a candidate's outer HTML.
/// The markup is sanitised first so nothing removed there can leak into the
/// record.
pub fn extract_ad(outer_html: &str, timestamp: i64) -> AdRecord {
    let cleaned = sanitize::clean_fragment(outer_html);
    let fragment = Html::parse_fragment(&cleaned);

    let mut ad = AdRecord::new(timestamp);
    ad.title = first_text(&fragment, TITLE_SELECTOR);
    ad.message = MESSAGE_SELECTORS
        .iter()
        .map(|css| first_text(&fragment, css).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ");
    ad.page = first_attribute(&fragment, PAGE_SELECTOR, "href");
    ad
}

fn first_text(fragment: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    fragment
        .select(&selector)
        .next()
        .map(|element| element.text().collect())
}

fn first_attribute(fragment: &Html, css: &str, name: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    fragment
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(name))
        .map(str::to_string)
}
