use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tokio::task;
use tracing::{debug, warn};

use soultrace_core_types::TaskId;

use crate::api::{TaskStore, TaskStoreResult};
use crate::errors::{TsError, TsErrorKind};
use crate::model::TaskRecord;

/// One pretty-printed JSON document per task under `root`.
///
/// Writes go through a temp file in the same directory and are renamed into
/// place, so readers never observe a torn record. Revision checks are
/// serialized per store instance.
#[derive(Clone)]
pub struct JsonFileTaskStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTaskStore {
    pub fn open(root: impl Into<PathBuf>) -> TaskStoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(target: "task_store", root = %root.display(), "file store opened");
        Ok(Self {
            inner: Arc::new(FileInner {
                root,
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    async fn blocking<T, F>(&self, op: F) -> TaskStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileInner) -> TaskStoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|err| TsError::new(TsErrorKind::Internal(err.to_string())))?
    }
}

/// File stem for a task id. `[A-Za-z0-9-]` pass through; every other byte,
/// `_` included, is written as `_XX` hex, so distinct ids never share a file.
pub fn file_stem(id: &TaskId) -> String {
    let mut stem = String::with_capacity(id.as_str().len());
    for byte in id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    stem
}

impl FileInner {
    fn path_for(&self, id: &TaskId) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(id)))
    }

    fn read(&self, id: &TaskId) -> TaskStoreResult<Option<TaskRecord>> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: TaskRecord = serde_json::from_slice(&bytes)?;
        if &record.id != id {
            return Err(TsError::new(TsErrorKind::InvalidRecord(format!(
                "{} holds task {}, expected {}",
                path.display(),
                record.id,
                id
            ))));
        }
        Ok(Some(record))
    }

    fn write(&self, record: &TaskRecord) -> TaskStoreResult<()> {
        let body = serde_json::to_vec_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(self.path_for(&record.id))
            .map_err(|err| TsError::new(TsErrorKind::Io(err.to_string())))?;
        Ok(())
    }

    fn store(
        &self,
        mut record: TaskRecord,
        expected: Option<Option<u64>>,
    ) -> TaskStoreResult<TaskRecord> {
        if record.id.is_empty() {
            return Err(TsError::new(TsErrorKind::InvalidRecord(
                "task id must not be empty".into(),
            )));
        }
        let _guard = self.write_lock.lock();
        let actual = self.read(&record.id)?.map(|current| current.revision);
        if let Some(expected) = expected {
            if expected != actual {
                return Err(TsError::new(TsErrorKind::Conflict {
                    id: record.id.clone(),
                    expected,
                    actual,
                }));
            }
        }
        record.revision = actual.unwrap_or(0) + 1;
        self.write(&record)?;
        Ok(record)
    }

    fn remove(&self, id: &TaskId) -> TaskStoreResult<bool> {
        let _guard = self.write_lock.lock();
        if self.read(id)?.is_none() {
            return Ok(false);
        }
        fs::remove_file(self.path_for(id))?;
        Ok(true)
    }

    fn scan(&self) -> TaskStoreResult<BTreeMap<TaskId, TaskRecord>> {
        let mut out = BTreeMap::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read(&path).map_err(TsError::from).and_then(|bytes| {
                serde_json::from_slice::<TaskRecord>(&bytes).map_err(TsError::from)
            });
            match parsed {
                Ok(record) => {
                    out.insert(record.id.clone(), record);
                }
                Err(err) => {
                    warn!(
                        target: "task_store",
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable task file"
                    );
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn get(&self, id: &TaskId) -> TaskStoreResult<Option<TaskRecord>> {
        let id = id.clone();
        self.blocking(move |inner| inner.read(&id)).await
    }

    async fn put(&self, id: &TaskId, mut record: TaskRecord) -> TaskStoreResult<TaskRecord> {
        record.id = id.clone();
        self.blocking(move |inner| inner.store(record, None)).await
    }

    async fn put_if_revision(
        &self,
        record: TaskRecord,
        expected: Option<u64>,
    ) -> TaskStoreResult<TaskRecord> {
        self.blocking(move |inner| inner.store(record, Some(expected)))
            .await
    }

    async fn delete(&self, id: &TaskId) -> TaskStoreResult<bool> {
        let id = id.clone();
        self.blocking(move |inner| inner.remove(&id)).await
    }

    async fn list_all(&self) -> TaskStoreResult<BTreeMap<TaskId, TaskRecord>> {
        self.blocking(|inner| inner.scan()).await
    }
}
