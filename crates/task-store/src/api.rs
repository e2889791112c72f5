use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use soultrace_core_types::TaskId;

use crate::errors::TsError;
use crate::model::{TaskRecord, TaskSummary};

pub type TaskStoreResult<T> = Result<T, TsError>;

/// Keyed, durable map from task identity to task record.
///
/// Every successful write bumps the stored record's `revision`; the value
/// passed in is ignored and the stored copy is returned.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: &TaskId) -> TaskStoreResult<Option<TaskRecord>>;

    /// Unconditional write, keyed by `id`.
    async fn put(&self, id: &TaskId, record: TaskRecord) -> TaskStoreResult<TaskRecord>;

    /// Write only when the stored revision equals `expected`; `None` means the
    /// task must not exist yet. Fails with `TsErrorKind::Conflict` otherwise.
    async fn put_if_revision(
        &self,
        record: TaskRecord,
        expected: Option<u64>,
    ) -> TaskStoreResult<TaskRecord>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &TaskId) -> TaskStoreResult<bool>;

    async fn list_all(&self) -> TaskStoreResult<BTreeMap<TaskId, TaskRecord>>;

    async fn summaries(&self) -> TaskStoreResult<Vec<TaskSummary>> {
        let mut rows: Vec<_> = self
            .list_all()
            .await?
            .values()
            .map(TaskRecord::summary)
            .collect();
        rows.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

/// Read-modify-write with optimistic concurrency.
///
/// `mutate` receives the current record (if any) and returns the record to
/// store, or `None` to leave the store untouched. On a revision conflict the
/// read is repeated, up to `attempts` times in total.
pub async fn update_task<S, F>(
    store: &S,
    id: &TaskId,
    attempts: usize,
    mut mutate: F,
) -> TaskStoreResult<Option<TaskRecord>>
where
    S: TaskStore + ?Sized,
    F: FnMut(Option<TaskRecord>) -> Option<TaskRecord> + Send,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let current = store.get(id).await?;
        let expected = current.as_ref().map(|record| record.revision);
        let Some(mut next) = mutate(current) else {
            return Ok(None);
        };
        next.id = id.clone();
        match store.put_if_revision(next, expected).await {
            Ok(stored) => return Ok(Some(stored)),
            Err(err) if err.is_conflict() && attempt < attempts => {
                debug!(target: "task_store", task = %id, attempt, "revision conflict, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}
