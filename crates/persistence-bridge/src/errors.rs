use thiserror::Error;

use soultrace_core_types::SoulError;
use soultrace_task_store::TsError;

/// Errors inside the bridge. They are folded into a [`crate::Delivery`]
/// before reaching capture code.
#[derive(Clone, Debug, Error)]
pub enum BridgeError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("no messaging channel attached")]
    NoChannel,
    #[error("timeout")]
    Timeout,
    #[error("channel closed")]
    ChannelClosed,
    #[error("remote error: {0}")]
    Remote(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BridgeError> for SoulError {
    fn from(value: BridgeError) -> Self {
        SoulError::new(value.to_string())
    }
}

impl From<TsError> for BridgeError {
    fn from(value: TsError) -> Self {
        BridgeError::Store(value.to_string())
    }
}
