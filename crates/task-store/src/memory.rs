use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use soultrace_core_types::TaskId;

use crate::api::{TaskStore, TaskStoreResult};
use crate::errors::{TsError, TsErrorKind};
use crate::model::TaskRecord;

/// Process-local store; contents vanish with the process.
#[derive(Default)]
pub struct InMemoryTaskStore {
    records: DashMap<TaskId, TaskRecord>,
}

impl InMemoryTaskStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn check_id(id: &TaskId) -> TaskStoreResult<()> {
    if id.is_empty() {
        return Err(TsError::new(TsErrorKind::InvalidRecord(
            "task id must not be empty".into(),
        )));
    }
    Ok(())
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: &TaskId) -> TaskStoreResult<Option<TaskRecord>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, id: &TaskId, mut record: TaskRecord) -> TaskStoreResult<TaskRecord> {
        check_id(id)?;
        record.id = id.clone();
        match self.records.entry(id.clone()) {
            Entry::Occupied(mut slot) => {
                record.revision = slot.get().revision + 1;
                slot.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                record.revision = 1;
                slot.insert(record.clone());
            }
        }
        Ok(record)
    }

    async fn put_if_revision(
        &self,
        mut record: TaskRecord,
        expected: Option<u64>,
    ) -> TaskStoreResult<TaskRecord> {
        check_id(&record.id)?;
        let conflict = |actual: Option<u64>, id: &TaskId| {
            TsError::new(TsErrorKind::Conflict {
                id: id.clone(),
                expected,
                actual,
            })
        };
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(mut slot) => {
                let actual = slot.get().revision;
                if expected != Some(actual) {
                    return Err(conflict(Some(actual), &record.id));
                }
                record.revision = actual + 1;
                slot.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                if expected.is_some() {
                    return Err(conflict(None, &record.id));
                }
                record.revision = 1;
                slot.insert(record.clone());
            }
        }
        Ok(record)
    }

    async fn delete(&self, id: &TaskId) -> TaskStoreResult<bool> {
        Ok(self.records.remove(id).is_some())
    }

    async fn list_all(&self) -> TaskStoreResult<BTreeMap<TaskId, TaskRecord>> {
        Ok(self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}
