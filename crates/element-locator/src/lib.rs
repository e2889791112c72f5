//! Element locator
//!
//! Computes the durable identifiers attached to every recorded event target:
//! a stable id (`bid`), a CSS path, an absolute XPath and an accessibility
//! descriptor. Also hosts the interactivity classifier shared by the event
//! filter and the normalizer.
//!
//! Every computation is a pure function of the [`DomDocument`] snapshot.
//! [`locate`] never fails; a strategy that cannot produce a value leaves its
//! field empty.

pub mod classifier;
pub mod errors;
pub mod hash;
pub mod strategies;
pub mod types;

pub use classifier::{classify, is_interactive, InteractivityReason};
pub use errors::LocatorError;
pub use strategies::{accessibility, css_path, stable_id, xpath};
pub use types::*;

use soultrace_dom_model::{DomDocument, NodeId};
use tracing::debug;

/// Computes all four identifiers for `node`, degrading each independently.
pub fn locate(doc: &DomDocument, node: NodeId) -> ElementLocators {
    ElementLocators {
        bid: degrade(LocatorKind::StableId, node, stable_id(doc, node).map(|id| id.value)),
        css_path: degrade(LocatorKind::CssPath, node, css_path(doc, node)),
        xpath: degrade(LocatorKind::XPath, node, xpath(doc, node)),
        accessibility: degrade(LocatorKind::Accessibility, node, accessibility(doc, node)),
    }
}

fn degrade<T: Default>(kind: LocatorKind, node: NodeId, result: Result<T, LocatorError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            debug!(
                target: "element_locator",
                strategy = kind.name(),
                node = node.0,
                severity = err.severity(),
                error = %err,
                "locator degraded"
            );
            T::default()
        }
    }
}
