//! Error types for locator system

use soultrace_core_types::SoulError;
use soultrace_dom_model::NodeId;
use thiserror::Error;

/// Locator error enumeration
///
/// These never reach callers of [`crate::locate`]; they explain why a single
/// identifier degraded to its empty value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// Node id does not exist in the document
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Node exists but is not an element
    #[error("Not an element: {0:?}")]
    NotAnElement(NodeId),

    /// Node is not reachable from the document element
    #[error("Detached node: {0:?}")]
    Detached(NodeId),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Get error severity (0=low, 1=medium, 2=high)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 2,
            LocatorError::UnknownNode(_) => 1,
            LocatorError::NotAnElement(_) | LocatorError::Detached(_) => 0,
        }
    }
}

impl From<LocatorError> for SoulError {
    fn from(err: LocatorError) -> Self {
        SoulError::new(err.to_string())
    }
}
