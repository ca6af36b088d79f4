//! The seam between the scanner and the live document it observes.
//!
//! The scanner never owns the document. It holds `Node` handles whose
//! equality is node identity, and asks the host for structure, layout and
//! the few interactions it needs (opening a menu, restoring focus).

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            top: y,
            left: x,
            bottom: y + height,
            right: x + width,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildNode<N> {
    Element(N),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange<N> {
    pub start: N,
    pub start_offset: usize,
    pub end: N,
    pub end_offset: usize,
}

pub trait HostDocument {
    type Node: Clone + Eq + Hash + Debug;

    /// Attached elements carrying `class`, in document order.
    fn elements_by_class(&self, class: &str) -> Vec<Self::Node>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn child_nodes(&self, node: &Self::Node) -> Vec<ChildNode<Self::Node>>;
    fn tag_name(&self, node: &Self::Node) -> String;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn outer_html(&self, node: &Self::Node) -> String;

    fn bounding_rect(&self, node: &Self::Node) -> Rect;
    fn viewport(&self) -> Viewport;
    /// Computed `::after` content, quotes included, if any.
    fn after_content(&self, node: &Self::Node) -> Option<String>;

    fn click(&mut self, node: &Self::Node);
    fn active_element(&self) -> Option<Self::Node>;
    fn focus(&mut self, node: &Self::Node);
    fn selection_ranges(&self) -> Vec<SelectionRange<Self::Node>>;
    fn set_selection_ranges(&mut self, ranges: Vec<SelectionRange<Self::Node>>);

    fn classes(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    fn children(&self, node: &Self::Node) -> Vec<Self::Node> {
        self.child_nodes(node)
            .into_iter()
            .filter_map(|child| match child {
                ChildNode::Element(element) => Some(element),
                ChildNode::Text(_) => None,
            })
            .collect()
    }

    /// Strict descendants in document order.
    fn descendants(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut found = Vec::new();
        let mut stack: Vec<Self::Node> = self.children(node).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            stack.extend(self.children(&next).into_iter().rev());
            found.push(next);
        }
        found
    }

    fn find_descendant<P>(&self, node: &Self::Node, predicate: P) -> Option<Self::Node>
    where
        Self: Sized,
        P: Fn(&Self, &Self::Node) -> bool,
    {
        self.descendants(node)
            .into_iter()
            .find(|candidate| predicate(self, candidate))
    }

    fn first_with_tag(&self, node: &Self::Node, tag: &str) -> Option<Self::Node>
    where
        Self: Sized,
    {
        self.find_descendant(node, |host, candidate| {
            host.tag_name(candidate).eq_ignore_ascii_case(tag)
        })
    }

    fn first_with_class(&self, node: &Self::Node, class: &str) -> Option<Self::Node>
    where
        Self: Sized,
    {
        self.find_descendant(node, |host, candidate| host.has_class(candidate, class))
    }

    /// The node itself, then each ancestor up to the root.
    fn ancestors(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut chain = vec![node.clone()];
        let mut current = node.clone();
        while let Some(parent) = self.parent(&current) {
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    fn text_content(&self, node: &Self::Node) -> String {
        let mut text = String::new();
        for child in self.child_nodes(node) {
            match child {
                ChildNode::Text(value) => text.push_str(&value),
                ChildNode::Element(element) => text.push_str(&self.text_content(&element)),
            }
        }
        text
    }

    /// Orders two nodes by where they start in the document. An ancestor
    /// sorts before its descendants; nodes in separate trees compare equal.
    fn compare_position(&self, a: &Self::Node, b: &Self::Node) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let mut a_path = self.ancestors(a);
        a_path.reverse();
        let mut b_path = self.ancestors(b);
        b_path.reverse();

        let shared = a_path
            .iter()
            .zip(&b_path)
            .take_while(|(x, y)| x == y)
            .count();
        match (a_path.get(shared), b_path.get(shared)) {
            (None, _) => Ordering::Less,
            (_, None) => Ordering::Greater,
            (Some(x), Some(y)) => match shared.checked_sub(1) {
                Some(parent) => {
                    let siblings = self.children(&a_path[parent]);
                    let index = |node: &Self::Node| siblings.iter().position(|s| s == node);
                    index(x).cmp(&index(y))
                }
                None => Ordering::Equal,
            },
        }
    }

    /// Whether `other` is `node` or lies inside it.
    fn contains(&self, node: &Self::Node, other: &Self::Node) -> bool {
        self.ancestors(other).iter().any(|ancestor| ancestor == node)
    }
}
