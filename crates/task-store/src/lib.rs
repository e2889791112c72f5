//! Durable task records.
//!
//! A task store maps a [`TaskId`](soultrace_core_types::TaskId) to its
//! [`TaskRecord`]: metadata, status and the append-only event log. Records
//! carry a `revision` so concurrent writers can use [`update_task`] instead of
//! blind read-modify-write.

pub mod api;
pub mod config;
pub mod errors;
pub mod export;
pub mod file;
pub mod memory;
pub mod model;

use std::sync::Arc;

pub use api::{update_task, TaskStore, TaskStoreResult};
pub use config::{StoreBackend, TaskStoreConfig};
pub use errors::{TsError, TsErrorKind};
pub use export::{export_all, export_task};
pub use file::JsonFileTaskStore;
pub use memory::InMemoryTaskStore;
pub use model::{PendingNavigation, TaskRecord, TaskStatus, TaskSummary};

/// Opens the backend selected by `cfg`.
pub fn open(cfg: &TaskStoreConfig) -> TaskStoreResult<Arc<dyn TaskStore>> {
    match cfg.backend {
        StoreBackend::Memory => Ok(InMemoryTaskStore::new()),
        StoreBackend::File => Ok(Arc::new(JsonFileTaskStore::open(cfg.root.clone())?)),
    }
}
