//! Bounded local log of messages the relay never acknowledged.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use soultrace_core_types::{now_millis, EpochMillis};

use crate::message::BridgeMessage;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub at: EpochMillis,
    pub reason: String,
    pub message: BridgeMessage,
}

pub struct BackupLog {
    capacity: usize,
    entries: Mutex<VecDeque<BackupEntry>>,
    mirror: Option<Mutex<File>>,
    mirror_path: Option<PathBuf>,
}

impl BackupLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
            mirror: None,
            mirror_path: None,
        }
    }

    /// Like [`BackupLog::new`], also appending every entry as a JSON line to
    /// `path`. The mirror is not bounded.
    pub fn with_mirror(capacity: usize, path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut log = Self::new(capacity);
        log.mirror = Some(Mutex::new(file));
        log.mirror_path = Some(path.to_path_buf());
        Ok(log)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mirror_path(&self) -> Option<&Path> {
        self.mirror_path.as_deref()
    }

    /// Records `message`. Returns `true` when an older entry was evicted.
    pub fn push(&self, message: BridgeMessage, reason: impl Into<String>) -> bool {
        let entry = BackupEntry {
            at: now_millis(),
            reason: reason.into(),
            message,
        };
        if let Some(mirror) = &self.mirror {
            if let Err(err) = write_line(&mut mirror.lock(), &entry) {
                warn!(target: "bridge.events", error = %err, "backup mirror write failed");
            }
        }
        let mut entries = self.entries.lock();
        let evicted = if entries.len() >= self.capacity {
            entries.pop_front();
            true
        } else {
            false
        };
        entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<BackupEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Removes and returns every entry, oldest first.
    pub fn drain(&self) -> Vec<BackupEntry> {
        self.entries.lock().drain(..).collect()
    }
}

fn write_line(file: &mut File, entry: &BackupEntry) -> io::Result<()> {
    let mut line = serde_json::to_vec(entry)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    line.push(b'\n');
    file.write_all(&line)?;
    file.flush()
}
