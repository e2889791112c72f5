use thiserror::Error;

use soultrace_core_types::SoulError;

use crate::node::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

impl From<DomError> for SoulError {
    fn from(err: DomError) -> Self {
        SoulError::new(err.to_string())
    }
}
