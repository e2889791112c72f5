use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which backend holds task records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Storage section of the runtime configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStoreConfig {
    pub backend: StoreBackend,
    /// Directory holding one JSON document per task (file backend only).
    pub root: PathBuf,
    /// Attempts made by `update_task` before a revision conflict is surfaced.
    pub update_retries: usize,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            root: PathBuf::from("./soultrace-tasks"),
            update_retries: 5,
        }
    }
}
