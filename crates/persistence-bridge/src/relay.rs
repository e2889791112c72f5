//! Background relay: the single owner of task-store writes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use soultrace_core_types::{EpochMillis, EventRecord, PageInfo, TaskId};
use soultrace_task_store::{update_task, PendingNavigation, TaskRecord, TaskStatus, TaskStore};

use crate::channel::Envelope;
use crate::errors::BridgeError;
use crate::message::{BridgeMessage, BridgeReply};

/// Produces page screenshots for `captureScreenshot` requests.
#[async_trait]
pub trait ScreenshotService: Send + Sync {
    async fn capture(&self, page: &PageInfo) -> Result<Option<String>, BridgeError>;
}

/// Service for hosts without screen capture.
#[derive(Clone, Debug, Default)]
pub struct NoScreenshots;

#[async_trait]
impl ScreenshotService for NoScreenshots {
    async fn capture(&self, _page: &PageInfo) -> Result<Option<String>, BridgeError> {
        Ok(None)
    }
}

pub struct BackgroundRelay {
    store: Arc<dyn TaskStore>,
    screenshots: Arc<dyn ScreenshotService>,
    retries: usize,
}

impl BackgroundRelay {
    pub fn new(store: Arc<dyn TaskStore>, retries: usize) -> Self {
        Self {
            store,
            screenshots: Arc::new(NoScreenshots),
            retries,
        }
    }

    pub fn with_screenshots(mut self, service: Arc<dyn ScreenshotService>) -> Self {
        self.screenshots = service;
        self
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.store)
    }

    /// Serves envelopes until every sender is gone.
    pub fn spawn(self, mut rx: mpsc::Receiver<Envelope>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let kind = envelope.message.kind();
                let reply = self.handle(envelope.message).await;
                if envelope.reply.send(reply).is_err() {
                    debug!(target: "bridge.events", kind, "relay reply dropped by sender");
                }
            }
            debug!(target: "bridge.events", "relay stopped");
        })
    }

    pub async fn handle(&self, message: BridgeMessage) -> BridgeReply {
        let kind = message.kind();
        match self.apply(message).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(target: "bridge.events", kind, error = %err, "relay.apply.failed");
                BridgeReply::Error {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn apply(&self, message: BridgeMessage) -> Result<BridgeReply, BridgeError> {
        match message {
            BridgeMessage::OpenTask { task_id, page, at } => {
                let record = self.open_task(&task_id, page, at).await?;
                Ok(BridgeReply::Task { record })
            }
            BridgeMessage::RecordedEvent { task_id, event } => {
                self.append(&task_id, vec![event]).await
            }
            BridgeMessage::FlushBuffer { task_id, events } => self.append(&task_id, events).await,
            BridgeMessage::CompleteTask { task_id, at } => self.complete(&task_id, at).await,
            BridgeMessage::PendingNavigation { task_id, pending } => {
                self.mark_pending(&task_id, pending).await
            }
            BridgeMessage::CaptureScreenshot { page_info } => {
                let data_url = self.screenshots.capture(&page_info).await?;
                Ok(BridgeReply::Screenshot { data_url })
            }
            BridgeMessage::TabUpdated { task_id, url, .. } => {
                let stored = update_task(self.store.as_ref(), &task_id, self.retries, |current| {
                    let mut record = current.filter(TaskRecord::is_recording)?;
                    if record.end_url == url {
                        return None;
                    }
                    record.end_url = url.clone();
                    Some(record)
                })
                .await?;
                Ok(BridgeReply::Ack {
                    applied: stored.is_some(),
                })
            }
            BridgeMessage::TabRemoved { task_id, at } => self.complete(&task_id, at).await,
        }
    }

    async fn open_task(
        &self,
        task_id: &TaskId,
        page: PageInfo,
        at: EpochMillis,
    ) -> Result<TaskRecord, BridgeError> {
        let mut taken: Option<PendingNavigation> = None;
        let stored = update_task(self.store.as_ref(), task_id, self.retries, |current| {
            taken = None;
            let mut record = match current {
                Some(record) => record,
                None => {
                    let record = TaskRecord::new(task_id.clone(), page.url.clone(), at);
                    if page.title.trim().is_empty() {
                        record
                    } else {
                        record.with_title(page.title.clone())
                    }
                }
            };
            if !record.is_recording() {
                record.status = TaskStatus::Recording;
                record.end_time = None;
            }
            taken = record.pending_navigation.take();
            Some(record)
        })
        .await?;
        let mut record = stored.ok_or_else(|| BridgeError::Internal("task not stored".into()))?;
        record.pending_navigation = taken;
        info!(
            target: "bridge.events",
            task = %task_id,
            events = record.events.len(),
            resumed = record.revision > 1,
            "relay.task.opened"
        );
        Ok(record)
    }

    async fn append(
        &self,
        task_id: &TaskId,
        events: Vec<EventRecord>,
    ) -> Result<BridgeReply, BridgeError> {
        let stored = update_task(self.store.as_ref(), task_id, self.retries, |current| {
            let mut record = match current {
                Some(record) if !record.is_recording() => return None,
                Some(record) => record,
                None => {
                    let url = events.first().map(|e| e.url.clone()).unwrap_or_default();
                    let start = events.first().map(|e| e.timestamp).unwrap_or_default();
                    TaskRecord::new(task_id.clone(), url, start)
                }
            };
            if record.merge_events(&events) == 0 {
                return None;
            }
            Some(record)
        })
        .await?;
        Ok(BridgeReply::Ack {
            applied: stored.is_some(),
        })
    }

    async fn complete(
        &self,
        task_id: &TaskId,
        at: EpochMillis,
    ) -> Result<BridgeReply, BridgeError> {
        let stored = update_task(self.store.as_ref(), task_id, self.retries, |current| {
            let mut record = current?;
            record.complete(at).then_some(record)
        })
        .await?;
        if let Some(record) = &stored {
            info!(
                target: "bridge.events",
                task = %task_id,
                events = record.events.len(),
                "relay.task.completed"
            );
        }
        Ok(BridgeReply::Ack {
            applied: stored.is_some(),
        })
    }

    async fn mark_pending(
        &self,
        task_id: &TaskId,
        pending: PendingNavigation,
    ) -> Result<BridgeReply, BridgeError> {
        let stored = update_task(self.store.as_ref(), task_id, self.retries, |current| {
            let mut record = current.filter(TaskRecord::is_recording)?;
            record.pending_navigation = Some(pending.clone());
            Some(record)
        })
        .await?;
        Ok(BridgeReply::Ack {
            applied: stored.is_some(),
        })
    }
}
