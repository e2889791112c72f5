use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use soultrace_core_types::BoundingBox;

/// Index of a node inside its owning [`crate::DomDocument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// One node of the snapshot. Tree links are owned by the document.
#[derive(Clone, Debug)]
pub struct DomNode {
    pub kind: NodeKind,
    /// Lower-cased tag name; empty for non-element nodes.
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Character data for text and comment nodes.
    pub text: String,
    /// Current form control value, when the host reports one.
    pub value: Option<String>,
    /// Inline `onclick` or a host-reported click listener.
    pub has_click_handler: bool,
    pub rect: Option<BoundingBox>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl DomNode {
    pub fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.trim().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: None,
            has_click_handler: false,
            rect: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            attributes: BTreeMap::new(),
            text: content.to_string(),
            value: None,
            has_click_handler: false,
            rect: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn comment(content: &str) -> Self {
        Self {
            kind: NodeKind::Comment,
            ..Self::text(content)
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value when present and not blank.
    pub fn non_empty_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).filter(|v| !v.trim().is_empty())
    }

    pub fn class_list(&self) -> Vec<&str> {
        self.attribute("class")
            .map(|raw| raw.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}
