//! Interactivity classification.
//!
//! Shared by the event filter and the normalizer, so it must stay a pure
//! predicate over the snapshot.

use serde::{Deserialize, Serialize};
use soultrace_dom_model::{DomDocument, NodeId};

pub const INTERACTIVE_TAGS: [&str; 5] = ["button", "input", "select", "textarea", "a"];

pub const INTERACTIVE_ROLES: [&str; 8] = [
    "button", "link", "checkbox", "radio", "textbox", "combobox", "listbox", "menuitem",
];

/// First rule that made an element interactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractivityReason {
    Tag,
    Role,
    ClickHandler,
    TabIndex,
}

pub fn classify(doc: &DomDocument, node: NodeId) -> Option<InteractivityReason> {
    let element = doc.element(node)?;
    if INTERACTIVE_TAGS.contains(&element.tag.as_str()) {
        return Some(InteractivityReason::Tag);
    }
    if let Some(role) = element.attribute("role") {
        let role = role.trim().to_ascii_lowercase();
        if INTERACTIVE_ROLES.contains(&role.as_str()) {
            return Some(InteractivityReason::Role);
        }
    }
    if element.has_click_handler {
        return Some(InteractivityReason::ClickHandler);
    }
    // String comparison on purpose: "00" or " 0" do not qualify.
    if element.attribute("tabindex") == Some("0") {
        return Some(InteractivityReason::TabIndex);
    }
    None
}

pub fn is_interactive(doc: &DomDocument, node: NodeId) -> bool {
    classify(doc, node).is_some()
}
