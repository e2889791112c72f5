use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use soultrace_core_types::TaskId;

use crate::api::{TaskStore, TaskStoreResult};
use crate::errors::{TsError, TsErrorKind};

/// Writes the serialized task record to `path` as pretty JSON.
pub async fn export_task<S>(store: &S, id: &TaskId, path: &Path) -> TaskStoreResult<usize>
where
    S: TaskStore + ?Sized,
{
    let record = store
        .get(id)
        .await?
        .ok_or_else(|| TsError::new(TsErrorKind::NotFound(id.clone())))?;
    let body = serde_json::to_vec_pretty(&record)?;
    write_atomic(path, &body)?;
    info!(
        target: "task_store",
        task = %id,
        path = %path.display(),
        events = record.events.len(),
        "task exported"
    );
    Ok(record.events.len())
}

/// Writes the whole id to record mapping to `path`. Returns the task count.
pub async fn export_all<S>(store: &S, path: &Path) -> TaskStoreResult<usize>
where
    S: TaskStore + ?Sized,
{
    let all = store.list_all().await?;
    let body = serde_json::to_vec_pretty(&all)?;
    write_atomic(path, &body)?;
    info!(target: "task_store", path = %path.display(), tasks = all.len(), "tasks exported");
    Ok(all.len())
}

fn write_atomic(path: &Path, body: &[u8]) -> TaskStoreResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| TsError::new(TsErrorKind::Io(err.to_string())))?;
    Ok(())
}
