use soultrace_core_types::BoundingBox;

use crate::errors::DomError;
use crate::node::{DomNode, NodeId, NodeKind};

/// Arena-backed DOM snapshot.
///
/// Nodes are never freed; detaching a node only unlinks it, so a [`NodeId`]
/// held by a pending occurrence stays valid (and reports itself detached).
#[derive(Clone, Debug, Default)]
pub struct DomDocument {
    nodes: Vec<DomNode>,
    root: Option<NodeId>,
}

impl DomDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document with an `html > (head, body)` skeleton.
    pub fn with_body() -> Self {
        let mut doc = Self::new();
        let html = doc.create_element("html");
        doc.root = Some(html);
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        // Freshly created ids under a fresh root cannot fail.
        let _ = doc.append_child(html, head);
        let _ = doc.append_child(html, body);
        doc
    }

    pub fn set_document_element(&mut self, id: NodeId) -> Result<(), DomError> {
        let node = self.node(id).ok_or(DomError::UnknownNode(id))?;
        if !node.is_element() {
            return Err(DomError::NotAnElement(id));
        }
        self.detach(id);
        self.root = Some(id);
        Ok(())
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.root
    }

    pub fn body(&self) -> Option<NodeId> {
        let root = self.root?;
        self.element_children(root)
            .find(|child| self.tag_name(*child) == Some("body"))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(DomNode::element(tag))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.push(DomNode::text(content))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.push(DomNode::comment(content))
    }

    fn push(&mut self, node: DomNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id.0)
    }

    /// Element view of a node; `None` for unknown ids and non-element nodes.
    pub fn element(&self, id: NodeId) -> Option<&DomNode> {
        self.node(id).filter(|n| n.is_element())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|n| n.tag.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|n| n.attribute(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Parent when it is an element (the document element has none).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Whether the node is reachable from the document element.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        if self.node(id).is_none() {
            return false;
        }
        id == root || self.ancestors(id).any(|a| a == root)
    }

    /// Zero-based position among the parent's element children.
    pub fn element_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.element_children(parent).position(|c| c == id)
    }

    /// One-based position among same-tag element siblings.
    pub fn same_tag_position(&self, id: NodeId) -> Option<usize> {
        let tag = self.tag_name(id)?;
        let parent = self.parent(id)?;
        let mut position = 0;
        for child in self.element_children(parent) {
            if self.tag_name(child) == Some(tag) {
                position += 1;
            }
            if child == id {
                return Some(position);
            }
        }
        None
    }

    /// Concatenated character data of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.kind {
            NodeKind::Text => out.push_str(&node.text),
            NodeKind::Comment => {}
            NodeKind::Element => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Element ids of the subtree rooted at `id` (inclusive), in document order.
    pub fn subtree_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.is_element(current) {
                out.push(current);
            }
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Every connected element in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.root
            .map(|root| self.subtree_elements(root))
            .unwrap_or_default()
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if self.node(child).is_none() {
            return Err(DomError::UnknownNode(child));
        }
        let parent_node = self.node(parent).ok_or(DomError::UnknownNode(parent))?;
        if !parent_node.is_element() {
            return Err(DomError::NotAnElement(parent));
        }
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(DomError::Cycle { parent, child });
        }
        self.detach(child);
        if self.root == Some(child) {
            self.root = None;
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Unlinks a node from its parent. The subtree stays addressable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let node = self.element_mut(id)?;
        node.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let node = self.element_mut(id)?;
        node.attributes.remove(&name.to_ascii_lowercase());
        Ok(())
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), DomError> {
        self.element_mut(id)?.value = Some(value.into());
        Ok(())
    }

    pub fn set_click_handler(&mut self, id: NodeId, attached: bool) -> Result<(), DomError> {
        self.element_mut(id)?.has_click_handler = attached;
        Ok(())
    }

    pub fn set_rect(&mut self, id: NodeId, rect: BoundingBox) -> Result<(), DomError> {
        self.element_mut(id)?.rect = Some(rect);
        Ok(())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut DomNode, DomError> {
        let node = self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))?;
        if !node.is_element() {
            return Err(DomError::NotAnElement(id));
        }
        Ok(node)
    }
}

pub struct Ancestors<'a> {
    doc: &'a DomDocument,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}
