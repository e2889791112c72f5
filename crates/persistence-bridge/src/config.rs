//! Persistence bridge policy.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgePolicyView {
    /// Caller-side timeout applied to every send.
    pub send_timeout_ms: u64,
    /// Entries kept in the in-memory backup ring; the oldest is evicted.
    pub backup_capacity: usize,
    /// Optional JSON-lines mirror of the backup ring.
    pub backup_file: Option<PathBuf>,
    /// Queue depth between capture contexts and the background relay.
    pub relay_queue: usize,
    /// Revision-conflict retries for relay writes.
    pub update_retries: usize,
}

impl Default for BridgePolicyView {
    fn default() -> Self {
        Self {
            send_timeout_ms: 2_000,
            backup_capacity: 512,
            backup_file: None,
            relay_queue: 256,
            update_retries: 5,
        }
    }
}

impl BridgePolicyView {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
