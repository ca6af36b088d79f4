//! A static host built from saved page markup.
//!
//! Layout and computed style are not part of HTML, so snapshots carry them as
//! attributes: `data-rect="x y width height"` for the bounding box and
//! `data-after-content` for the `::after` content. Elements carrying
//! `data-ownerid` (menu layers and lazily populated menu entries) stay
//! detached until the element whose `id` they name has been opened by a
//! click, and only appear once the configured menu latency has elapsed on the
//! tokio clock.

use crate::host::{ChildNode, HostDocument, Rect, SelectionRange, Viewport};
use crate::markup;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<Child>,
}

#[derive(Debug)]
enum Child {
    Element(NodeId),
    Text(String),
}

#[derive(Debug)]
pub struct SnapshotDocument {
    elements: Vec<Element>,
    ids: HashMap<String, NodeId>,
    viewport: Viewport,
    rects: HashMap<NodeId, Rect>,
    opened: HashMap<NodeId, Instant>,
    menu_latency: Duration,
    clicks: HashMap<NodeId, usize>,
    active: Option<NodeId>,
    selection: Vec<SelectionRange<NodeId>>,
}

impl SnapshotDocument {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut snapshot = Self {
            elements: Vec::new(),
            ids: HashMap::new(),
            viewport: Viewport::default(),
            rects: HashMap::new(),
            opened: HashMap::new(),
            menu_latency: Duration::ZERO,
            clicks: HashMap::new(),
            active: None,
            selection: Vec::new(),
        };
        snapshot.build(document.root_element(), None);
        debug!("Parsed snapshot with {} elements", snapshot.elements.len());
        snapshot
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// How long an opened menu takes to render.
    pub fn with_menu_latency(mut self, latency: Duration) -> Self {
        self.menu_latency = latency;
        self
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rects.insert(node, rect);
    }

    pub fn click_count(&self, node: NodeId) -> usize {
        self.clicks.get(&node).copied().unwrap_or(0)
    }

    pub fn total_clicks(&self) -> usize {
        self.clicks.values().sum()
    }

    pub fn is_open(&self, node: NodeId) -> bool {
        self.opened.contains_key(&node)
    }

    fn build(&mut self, element: ElementRef<'_>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.elements.len());
        let value = element.value();
        let attributes: Vec<(String, String)> = value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        if let Some(dom_id) = value.attr("id") {
            self.ids.entry(dom_id.to_string()).or_insert(id);
        }
        self.elements.push(Element {
            tag: value.name().to_string(),
            attributes,
            parent,
            children: Vec::new(),
        });

        let mut children = Vec::new();
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                children.push(Child::Element(self.build(child_element, Some(id))));
            } else if let Some(text) = child.value().as_text() {
                children.push(Child::Text(String::from(&*text.text)));
            }
        }
        self.elements[id.0].children = children;
        id
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.elements.get(node.0)
    }

    fn raw_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Detached until the owning toggle is open and the menu has rendered.
    fn is_detached(&self, node: NodeId) -> bool {
        let Some(owner) = self.raw_attribute(node, "data-ownerid") else {
            return false;
        };
        let Some(owner) = self.element_by_id(owner) else {
            return true;
        };
        match self.opened.get(&owner) {
            Some(opened_at) => Instant::now() < *opened_at + self.menu_latency,
            None => true,
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.is_detached(id) {
                return false;
            }
            current = self.element(id).and_then(|element| element.parent);
        }
        true
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        let Some(element) = self.element(node) else {
            return;
        };
        markup::push_open_tag(
            out,
            &element.tag,
            element
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        for child in &element.children {
            match child {
                Child::Text(text) => markup::push_child_text(out, &element.tag, text),
                Child::Element(id) if !self.is_detached(*id) => self.serialize(*id, out),
                Child::Element(_) => {}
            }
        }
        markup::push_close_tag(out, &element.tag);
    }

    fn parse_rect(value: &str) -> Option<Rect> {
        let numbers: Vec<f64> = value
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        match numbers.as_slice() {
            [x, y, width, height] => Some(Rect::new(*x, *y, *width, *height)),
            _ => None,
        }
    }
}

impl HostDocument for SnapshotDocument {
    type Node = NodeId;

    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        (0..self.elements.len())
            .map(NodeId)
            .filter(|node| self.has_class(node, class) && self.is_attached(*node))
            .collect()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.element(*node)?.parent
    }

    fn child_nodes(&self, node: &NodeId) -> Vec<ChildNode<NodeId>> {
        let Some(element) = self.element(*node) else {
            return Vec::new();
        };
        element
            .children
            .iter()
            .filter_map(|child| match child {
                Child::Text(text) => Some(ChildNode::Text(text.clone())),
                Child::Element(id) if !self.is_detached(*id) => Some(ChildNode::Element(*id)),
                Child::Element(_) => None,
            })
            .collect()
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.element(*node)
            .map(|element| element.tag.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.raw_attribute(*node, name).map(str::to_string)
    }

    fn outer_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.serialize(*node, &mut out);
        out
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        if let Some(rect) = self.rects.get(node) {
            return *rect;
        }
        self.raw_attribute(*node, "data-rect")
            .and_then(Self::parse_rect)
            .unwrap_or_else(|| Rect::new(0.0, 0.0, 1.0, 1.0))
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn after_content(&self, node: &NodeId) -> Option<String> {
        self.attribute(node, "data-after-content")
    }

    fn click(&mut self, node: &NodeId) {
        *self.clicks.entry(*node).or_insert(0) += 1;
        if self.opened.remove(node).is_none() {
            self.opened.insert(*node, Instant::now());
        }
        self.active = Some(*node);
        self.selection.clear();
    }

    fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    fn focus(&mut self, node: &NodeId) {
        self.active = Some(*node);
    }

    fn selection_ranges(&self) -> Vec<SelectionRange<NodeId>> {
        self.selection.clone()
    }

    fn set_selection_ranges(&mut self, ranges: Vec<SelectionRange<NodeId>>) {
        self.selection = ranges;
    }
}
