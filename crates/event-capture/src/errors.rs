use thiserror::Error;

use soultrace_core_types::SoulError;
use soultrace_dom_model::NodeId;

#[derive(Clone, Debug, Error)]
pub enum CaptureError {
    #[error("capture listeners could not be attached: {0}")]
    AttachFailed(String),
    #[error("listener detach failed: {0}")]
    DetachFailed(String),
    #[error("mutation watch failed: {0}")]
    ObserverFailed(String),
    #[error("invalid task id")]
    InvalidTask,
    #[error("occurrence has no target")]
    MissingTarget,
    #[error("target {0:?} is not a live element")]
    InvalidTarget(NodeId),
    #[error("target {0:?} is detached from the document")]
    DetachedTarget(NodeId),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Errors that only cost the current occurrence.
    pub fn is_occurrence_local(&self) -> bool {
        matches!(
            self,
            CaptureError::MissingTarget
                | CaptureError::InvalidTarget(_)
                | CaptureError::DetachedTarget(_)
        )
    }
}

impl From<CaptureError> for SoulError {
    fn from(err: CaptureError) -> Self {
        SoulError::new(err.to_string())
    }
}
