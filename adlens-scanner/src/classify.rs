//! Structural checks that decide whether a candidate is an ad and where its
//! disclosure-menu control lives.

use crate::error::ExtractError;
use crate::host::{ChildNode, HostDocument};
use crate::model::Identifier;
use serde_json::Value;

pub const TIMELINE_CLASSES: &[&str] = &["userContentWrapper", "_5pcr"];
pub const SIDEBAR_CLASS: &str = "ego_unit";

/// Case-sensitive sponsor labels, one per supported locale.
pub const SPONSOR_LABELS: &[&str] = &[
    "Sponsored",
    "Gesponsert",
    "Sponsoreret",
    "Sponsrad",
    "Sponsorizzato",
];

const SPONSOR_SCOPES: &[&str] = &["clearfix", "ego_section"];
const FEED_CONTAINER_PREFIX: &str = "hyperfeed";
const SIDEBAR_SECTION: &str = "ego_section";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Timeline,
    Sidebar,
}

/// The control that opens a candidate's disclosure menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuControl<N> {
    pub control: N,
    pub toggle: N,
    /// Stable per control; keys the session's identity cache.
    pub key: Identifier,
}

pub fn classify<H: HostDocument>(host: &H, node: &H::Node) -> Option<CandidateKind> {
    if TIMELINE_CLASSES
        .iter()
        .any(|class| host.has_class(node, class))
    {
        Some(CandidateKind::Timeline)
    } else if host.has_class(node, SIDEBAR_CLASS) {
        Some(CandidateKind::Sidebar)
    } else {
        None
    }
}

/// Looks for a visible anchor labelled as sponsored, either by its text or by
/// its computed `::after` content.
pub fn is_sponsored<H: HostDocument>(host: &H, node: &H::Node) -> bool {
    host.descendants(node)
        .into_iter()
        .filter(|candidate| host.tag_name(candidate).eq_ignore_ascii_case("a"))
        .filter(|anchor| in_sponsor_scope(host, anchor))
        .filter(|anchor| host.bounding_rect(anchor).width() != 0.0)
        .any(|anchor| {
            let label = label_text(host, &anchor);
            let first_word = label.trim().split(' ').next().unwrap_or_default();
            let after = host.after_content(&anchor);
            SPONSOR_LABELS.iter().any(|sponsor| {
                first_word == *sponsor || after.as_deref() == Some(format!("\"{sponsor}\"").as_str())
            })
        })
}

/// A sponsored timeline post: returns the innermost content wrapper to record
/// and the feed container holding the post's controls.
pub fn timeline_post<H: HostDocument>(
    host: &H,
    node: &H::Node,
) -> Result<(H::Node, H::Node), ExtractError> {
    if !is_sponsored(host, node) {
        return Err(ExtractError::NotAnAd);
    }

    let container = host
        .ancestors(node)
        .into_iter()
        .find(|ancestor| {
            host.attribute(ancestor, "id")
                .is_some_and(|id| id.starts_with(FEED_CONTAINER_PREFIX))
        })
        .ok_or(ExtractError::NotAnAd)?;

    if host.children(node).is_empty() {
        return Err(ExtractError::NotAnAd);
    }

    // Shares and likes wrap the actual ad unit in another wrapper.
    let content = host
        .first_with_class(node, TIMELINE_CLASSES[0])
        .unwrap_or_else(|| node.clone());

    Ok((content, container))
}

/// A sponsored sidebar unit: returns the sponsored section around it.
pub fn sidebar_unit<H: HostDocument>(host: &H, node: &H::Node) -> Result<H::Node, ExtractError> {
    let section = host
        .ancestors(node)
        .into_iter()
        .find(|ancestor| is_sponsored(host, ancestor))
        .filter(|section| host.has_class(section, SIDEBAR_SECTION))
        .ok_or(ExtractError::NotAnAd)?;

    if host.attribute(node, "data-ego-fbid").is_none() || host.children(node).is_empty() {
        return Err(ExtractError::NotAnAd);
    }

    Ok(section)
}

/// Timeline posts open their menu from a popover whose anchor id names the
/// menu layer.
pub fn timeline_control<H: HostDocument>(
    host: &H,
    container: &H::Node,
) -> Result<MenuControl<H::Node>, ExtractError> {
    let control = host
        .first_with_class(container, "uiPopover")
        .ok_or(ExtractError::NoToggle)?;
    let toggle = host
        .first_with_tag(&control, "a")
        .ok_or(ExtractError::NoToggle)?;
    let key = host
        .attribute(&toggle, "id")
        .filter(|id| !id.is_empty())
        .ok_or(ExtractError::NoToggle)?;

    Ok(MenuControl {
        control,
        toggle,
        key: Identifier::new(key),
    })
}

/// Sidebar units carry their ad id in the selector anchor's `data-gt` JSON.
pub fn sidebar_control<H: HostDocument>(
    host: &H,
    section: &H::Node,
) -> Result<MenuControl<H::Node>, ExtractError> {
    let control = host
        .first_with_class(section, "uiSelector")
        .ok_or(ExtractError::NoToggle)?;
    let toggle = host
        .first_with_tag(&control, "a")
        .ok_or(ExtractError::NoToggle)?;
    let data = host
        .attribute(&toggle, "data-gt")
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .ok_or(ExtractError::NoToggle)?;

    let key = match &data["data_to_log"]["ad_id"] {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return Err(ExtractError::NoToggle),
    };

    Ok(MenuControl {
        control,
        toggle,
        key: Identifier::new(key),
    })
}

fn in_sponsor_scope<H: HostDocument>(host: &H, anchor: &H::Node) -> bool {
    host.ancestors(anchor).iter().skip(1).any(|ancestor| {
        SPONSOR_SCOPES
            .iter()
            .any(|class| host.has_class(ancestor, class))
    })
}

/// Anchor text without the one-character canary elements the host scatters
/// through sponsor labels.
fn label_text<H: HostDocument>(host: &H, node: &H::Node) -> String {
    let mut text = String::new();
    for child in host.child_nodes(node) {
        match child {
            ChildNode::Text(value) => text.push_str(&value),
            ChildNode::Element(element) if is_canary(host, &element) => {}
            ChildNode::Element(element) => text.push_str(&label_text(host, &element)),
        }
    }
    text
}

fn is_canary<H: HostDocument>(host: &H, node: &H::Node) -> bool {
    let tag = host.tag_name(node);
    if !(tag.eq_ignore_ascii_case("span") || tag.eq_ignore_ascii_case("div")) {
        return false;
    }
    let class_count = host
        .attribute(node, "class")
        .map(|class| class.split(' ').count())
        .unwrap_or(0);
    class_count == 2 && host.text_content(node).chars().count() == 1
}
