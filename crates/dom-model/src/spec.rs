use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use soultrace_core_types::BoundingBox;

use crate::document::DomDocument;
use crate::errors::DomError;
use crate::node::NodeId;

/// Nested, serializable description of a DOM subtree.
///
/// A spec with a `tag` is an element; one with only `text` is a text node.
///
/// ```json
/// {"tag": "button", "attrs": {"id": "submit"}, "children": [{"text": "Send"}]}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub onclick: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            text: Some(content.to_string()),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(self, content: &str) -> Self {
        self.child(NodeSpec::text(content))
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_onclick(mut self) -> Self {
        self.onclick = true;
        self
    }

    pub fn with_rect(mut self, rect: BoundingBox) -> Self {
        self.rect = Some(rect);
        self
    }
}

impl DomDocument {
    /// Builds a document whose document element is `spec`.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, DomError> {
        let mut doc = DomDocument::new();
        let root = doc.build_detached(spec)?;
        doc.set_document_element(root)?;
        Ok(doc)
    }

    pub fn from_json(raw: &str) -> Result<Self, DomError> {
        let spec: NodeSpec =
            serde_json::from_str(raw).map_err(|err| DomError::InvalidSnapshot(err.to_string()))?;
        Self::from_spec(&spec)
    }

    /// Appends `spec` under `parent` and returns every inserted element id in
    /// document order, subtree root first.
    pub fn insert_subtree(
        &mut self,
        parent: NodeId,
        spec: &NodeSpec,
    ) -> Result<Vec<NodeId>, DomError> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        let root = self.build_detached(spec)?;
        self.append_child(parent, root)?;
        Ok(self.subtree_elements(root))
    }

    fn build_detached(&mut self, spec: &NodeSpec) -> Result<NodeId, DomError> {
        let id = match (&spec.tag, &spec.text) {
            (Some(tag), _) => {
                if tag.trim().is_empty() {
                    return Err(DomError::InvalidSnapshot("empty tag name".into()));
                }
                let id = self.create_element(tag);
                for (name, value) in &spec.attrs {
                    self.set_attribute(id, name, value)?;
                }
                if let Some(value) = &spec.value {
                    self.set_value(id, value.clone())?;
                }
                if spec.onclick || spec.attrs.contains_key("onclick") {
                    self.set_click_handler(id, true)?;
                }
                if let Some(rect) = spec.rect {
                    self.set_rect(id, rect)?;
                }
                if let Some(text) = &spec.text {
                    let text_node = self.create_text(text);
                    self.append_child(id, text_node)?;
                }
                id
            }
            (None, Some(text)) => {
                if !spec.children.is_empty() {
                    return Err(DomError::InvalidSnapshot(
                        "text nodes cannot have children".into(),
                    ));
                }
                return Ok(self.create_text(text));
            }
            (None, None) => {
                return Err(DomError::InvalidSnapshot(
                    "node needs either a tag or text".into(),
                ))
            }
        };
        for child in &spec.children {
            let child_id = self.build_detached(child)?;
            self.append_child(id, child_id)?;
        }
        Ok(id)
    }
}
