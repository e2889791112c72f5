use thiserror::Error;

use soultrace_core_types::{SoulError, TaskId};

#[derive(Clone, Debug, Error)]
pub enum TsErrorKind {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("revision conflict on {id}: expected {expected:?}, found {actual:?}")]
    Conflict {
        id: TaskId,
        expected: Option<u64>,
        actual: Option<u64>,
    },
    #[error("invalid task record: {0}")]
    InvalidRecord(String),
    #[error("storage I/O failed: {0}")]
    Io(String),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct TsError(pub TsErrorKind);

impl TsError {
    pub fn new(kind: TsErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &TsErrorKind {
        &self.0
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.0, TsErrorKind::Conflict { .. })
    }
}

impl From<TsError> for SoulError {
    fn from(value: TsError) -> Self {
        SoulError::new(value.to_string())
    }
}

impl From<TsErrorKind> for TsError {
    fn from(kind: TsErrorKind) -> Self {
        TsError(kind)
    }
}

impl From<std::io::Error> for TsError {
    fn from(err: std::io::Error) -> Self {
        TsError(TsErrorKind::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for TsError {
    fn from(err: serde_json::Error) -> Self {
        TsError(TsErrorKind::Serialization(err.to_string()))
    }
}
