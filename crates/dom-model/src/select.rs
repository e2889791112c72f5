//! Compound selector lookup.
//!
//! Supports a single compound selector (`tag`, `#id`, `.class`, `[attr]`,
//! `[attr=value]` in any combination). No combinators; hosts that need more
//! resolve targets themselves and pass [`NodeId`]s.

use crate::document::DomDocument;
use crate::errors::DomError;
use crate::node::{DomNode, NodeId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self, DomError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomError::InvalidSelector("empty selector".into()));
        }
        if raw.contains(char::is_whitespace) || raw.contains('>') {
            return Err(DomError::InvalidSelector(format!(
                "combinators are not supported: {raw}"
            )));
        }
        let mut selector = Selector::default();
        let mut rest = raw;
        let tag_end = rest.find(&['#', '.', '['][..]).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if tag != "*" {
                selector.tag = Some(tag.to_ascii_lowercase());
            }
            rest = &rest[tag_end..];
        }
        while let Some(first) = rest.chars().next() {
            match first {
                '#' | '.' => {
                    let body = &rest[1..];
                    let end = body.find(&['#', '.', '['][..]).unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return Err(DomError::InvalidSelector(format!("dangling '{first}'")));
                    }
                    if first == '#' {
                        selector.id = Some(name.to_string());
                    } else {
                        selector.classes.push(name.to_string());
                    }
                    rest = &body[end..];
                }
                '[' => {
                    let close = rest
                        .find(']')
                        .ok_or_else(|| DomError::InvalidSelector("unclosed '['".into()))?;
                    let inner = &rest[1..close];
                    let attr = match inner.split_once('=') {
                        Some((name, value)) => (
                            name.trim().to_ascii_lowercase(),
                            Some(value.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string()),
                        ),
                        None => (inner.trim().to_ascii_lowercase(), None),
                    };
                    if attr.0.is_empty() {
                        return Err(DomError::InvalidSelector("empty attribute name".into()));
                    }
                    selector.attrs.push(attr);
                    rest = &rest[close + 1..];
                }
                other => {
                    return Err(DomError::InvalidSelector(format!(
                        "unexpected character '{other}'"
                    )))
                }
            }
        }
        Ok(selector)
    }

    pub fn matches(&self, node: &DomNode) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        let classes = node.class_list();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attrs.iter().all(|(name, expected)| match expected {
            Some(value) => node.attribute(name) == Some(value.as_str()),
            None => node.attribute(name).is_some(),
        })
    }
}

impl DomDocument {
    /// First connected element matching `selector`, in document order.
    pub fn select(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .elements()
            .into_iter()
            .find(|id| self.node(*id).is_some_and(|n| parsed.matches(n))))
    }

    pub fn select_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let parsed = Selector::parse(selector)?;
        Ok(self
            .elements()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| parsed.matches(n)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::NodeSpec;

    fn doc() -> DomDocument {
        let mut doc = DomDocument::with_body();
        let body = doc.body().unwrap();
        doc.insert_subtree(
            body,
            &NodeSpec::element("form")
                .child(NodeSpec::element("input").attr("name", "q").attr("class", "field big"))
                .child(NodeSpec::element("button").attr("id", "go").attr("type", "submit")),
        )
        .unwrap();
        doc
    }

    #[test]
    fn selects_by_id_class_and_attribute() {
        let doc = doc();
        let by_id = doc.select("#go").unwrap().unwrap();
        assert_eq!(doc.tag_name(by_id), Some("button"));
        let by_class = doc.select("input.field.big").unwrap().unwrap();
        assert_eq!(doc.attribute(by_class, "name"), Some("q"));
        let by_attr = doc.select("[type=\"submit\"]").unwrap().unwrap();
        assert_eq!(by_attr, by_id);
        assert!(doc.select("input.missing").unwrap().is_none());
    }

    #[test]
    fn rejects_combinators() {
        assert!(Selector::parse("form > input").is_err());
        assert!(Selector::parse("[name").is_err());
    }
}
