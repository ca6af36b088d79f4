//! Strips captured markup down to what is worth keeping: no media, forms or
//! controls, and no attributes that could carry tracking data.

use crate::markup;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const REMOVED_ELEMENTS: &[&str] = &[
    "video",
    "input",
    "button",
    "iframe",
    "script",
    "style",
    "object",
    "embed",
    r#"a[href=""]"#,
    ".accessible_elem",
    ".uiLikePagebutton",
    ".uiPopover",
    ".uiCloseButton",
    ".uiChevronSelectorButton",
    "h5._1qbu",
    ".commentable_item",
];

const KEPT_ATTRIBUTES: &[&str] = &["id", "class", "src", "href", "data-hovercard"];

const HOST_ORIGIN: &str = "https://www.facebook.com/";
const HOVERCARD_PATH: &str = "/ajax/hovercard/page.php";

/// Sanitises an HTML fragment and serialises it back to markup.
pub fn clean_fragment(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let removed: Vec<Selector> = REMOVED_ELEMENTS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect();

    let mut out = String::new();
    write_children(fragment.root_element(), &removed, &mut out);
    out
}

/// Disclosure panels are matched against literal phrases, so escaped
/// ampersands are turned back into plain ones.
pub fn disclosure_text(html: &str) -> String {
    clean_fragment(html).replace("&amp;", "&")
}

fn write_children(element: ElementRef<'_>, removed: &[Selector], out: &mut String) {
    let parent = element.value().name();
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_element(child_element, removed, out);
        } else if let Some(text) = child.value().as_text() {
            markup::push_child_text(out, parent, &*text.text);
        }
    }
}

fn write_element(element: ElementRef<'_>, removed: &[Selector], out: &mut String) {
    if removed.iter().any(|selector| selector.matches(&element)) {
        return;
    }

    let tag = element.value().name();
    let attributes: Vec<(&str, String)> = element
        .value()
        .attrs()
        .filter_map(|(name, value)| clean_attribute(name, value).map(|value| (name, value)))
        .collect();

    markup::push_open_tag(
        out,
        tag,
        attributes
            .iter()
            .map(|(name, value)| (*name, value.as_str())),
    );
    write_children(element, removed, out);
    markup::push_close_tag(out, tag);
}

fn clean_attribute(name: &str, value: &str) -> Option<String> {
    match name {
        "href" => clean_href(value),
        "data-hovercard" => hovercard_page(value),
        _ if KEPT_ATTRIBUTES.contains(&name) => Some(value.to_string()),
        _ => None,
    }
}

/// Reduces a link to origin and path, unwrapping outbound redirect links.
fn clean_href(href: &str) -> Option<String> {
    if href == "#" {
        return Some(href.to_string());
    }

    let mut url = Url::parse(href).ok()?;
    if url.host_str() == Some("l.facebook.com") {
        let target = url
            .query_pairs()
            .find(|(key, _)| key == "u")
            .map(|(_, value)| value.into_owned())?;
        url = Url::parse(&target).ok()?;
    }

    let origin = url.origin();
    origin
        .is_tuple()
        .then(|| format!("{}{}", origin.ascii_serialization(), url.path()))
}

/// Page hovercards keep only the page id, as a plain page link.
fn hovercard_page(value: &str) -> Option<String> {
    let url = Url::parse(HOST_ORIGIN).ok()?.join(value).ok()?;
    if !url.path().starts_with(HOVERCARD_PATH) {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, id)| format!("{HOST_ORIGIN}{id}"))
}
