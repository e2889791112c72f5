use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::{debug, warn};

use soultrace_core_types::{EpochMillis, EventRecord, PageInfo, TaskId};
use soultrace_task_store::{PendingNavigation, TaskRecord};

use crate::backup::BackupLog;
use crate::channel::MessageChannel;
use crate::config::BridgePolicyView;
use crate::errors::BridgeError;
use crate::message::{BridgeMessage, BridgeReply};
use crate::metrics::BridgeMetrics;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    /// Sent, or attempted, without an acknowledgement.
    Undelivered { reason: String },
    /// Failed validation and never left the caller.
    Rejected { reason: String },
}

/// Outcome of one send. Always produced; the bridge has no error path.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub status: DeliveryStatus,
    pub reply: Option<BridgeReply>,
    pub backed_up: bool,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// Capture-side endpoint for everything that must reach the task store.
///
/// Every call validates, sends with a single timeout and resolves to a
/// [`Delivery`]. Writes that are not acknowledged land in the [`BackupLog`].
pub struct PersistenceBridge {
    channel: RwLock<Option<Arc<dyn MessageChannel>>>,
    policy: BridgePolicyView,
    backup: Arc<BackupLog>,
    metrics: BridgeMetrics,
}

impl PersistenceBridge {
    pub fn new(policy: BridgePolicyView, channel: Option<Arc<dyn MessageChannel>>) -> Self {
        let backup = match &policy.backup_file {
            Some(path) => match BackupLog::with_mirror(policy.backup_capacity, path) {
                Ok(log) => log,
                Err(err) => {
                    warn!(
                        target: "bridge.events",
                        path = %path.display(),
                        error = %err,
                        "backup mirror unavailable, keeping memory ring only"
                    );
                    BackupLog::new(policy.backup_capacity)
                }
            },
            None => BackupLog::new(policy.backup_capacity),
        };
        Self {
            channel: RwLock::new(channel),
            policy,
            backup: Arc::new(backup),
            metrics: BridgeMetrics::default(),
        }
    }

    pub fn attach_channel(&self, channel: Arc<dyn MessageChannel>) {
        *self.channel.write() = Some(channel);
    }

    /// Drops the channel, as when the hosting page goes away.
    pub fn detach_channel(&self) {
        *self.channel.write() = None;
    }

    pub fn has_channel(&self) -> bool {
        self.channel
            .read()
            .as_ref()
            .map(|channel| channel.is_open())
            .unwrap_or(false)
    }

    pub fn policy(&self) -> &BridgePolicyView {
        &self.policy
    }

    pub fn backup(&self) -> &BackupLog {
        &self.backup
    }

    pub fn metrics(&self) -> BridgeMetrics {
        self.metrics.clone()
    }

    pub async fn send(&self, message: BridgeMessage) -> Delivery {
        self.send_with_timeout(message, self.policy.send_timeout())
            .await
    }

    pub async fn send_with_timeout(&self, message: BridgeMessage, timeout: Duration) -> Delivery {
        let kind = message.kind();
        if let Err(err) = message.validate() {
            self.metrics.record_rejected();
            warn!(target: "bridge.events", kind, error = %err, "bridge.send.rejected");
            return Delivery {
                status: DeliveryStatus::Rejected {
                    reason: err.to_string(),
                },
                reply: None,
                backed_up: false,
            };
        }

        let channel = self.channel.read().clone();
        let outcome = match channel {
            None => Err(BridgeError::NoChannel),
            Some(channel) => match time::timeout(timeout, channel.request(message.clone())).await
            {
                Ok(Ok(BridgeReply::Error { message })) => Err(BridgeError::Remote(message)),
                Ok(result) => result,
                Err(_) => Err(BridgeError::Timeout),
            },
        };

        match outcome {
            Ok(reply) => {
                self.metrics.record_delivered();
                debug!(target: "bridge.events", kind, "bridge.send.delivered");
                Delivery {
                    status: DeliveryStatus::Delivered,
                    reply: Some(reply),
                    backed_up: false,
                }
            }
            Err(err) => {
                self.metrics
                    .record_undelivered(matches!(err, BridgeError::Timeout));
                let backed_up = message.is_write();
                if backed_up {
                    let evicted = self.backup.push(message, err.to_string());
                    self.metrics.record_backup(evicted);
                }
                debug!(
                    target: "bridge.events",
                    kind,
                    error = %err,
                    backed_up,
                    "bridge.send.undelivered"
                );
                Delivery {
                    status: DeliveryStatus::Undelivered {
                        reason: err.to_string(),
                    },
                    reply: None,
                    backed_up,
                }
            }
        }
    }

    pub async fn open_task(
        &self,
        task_id: &TaskId,
        page: PageInfo,
        at: EpochMillis,
    ) -> Option<TaskRecord> {
        let delivery = self
            .send(BridgeMessage::OpenTask {
                task_id: task_id.clone(),
                page,
                at,
            })
            .await;
        match delivery.reply {
            Some(BridgeReply::Task { record }) => Some(record),
            _ => None,
        }
    }

    pub async fn send_event(&self, task_id: &TaskId, event: EventRecord) -> Delivery {
        self.send(BridgeMessage::RecordedEvent {
            task_id: task_id.clone(),
            event,
        })
        .await
    }

    pub async fn flush_buffer(&self, task_id: &TaskId, events: Vec<EventRecord>) -> Delivery {
        self.send(BridgeMessage::FlushBuffer {
            task_id: task_id.clone(),
            events,
        })
        .await
    }

    pub async fn complete_task(&self, task_id: &TaskId, at: EpochMillis) -> Delivery {
        self.send(BridgeMessage::CompleteTask {
            task_id: task_id.clone(),
            at,
        })
        .await
    }

    pub async fn note_pending_navigation(
        &self,
        task_id: &TaskId,
        pending: PendingNavigation,
    ) -> Delivery {
        self.send(BridgeMessage::PendingNavigation {
            task_id: task_id.clone(),
            pending,
        })
        .await
    }

    /// Screenshot as a data URL, or `None` on timeout or transport failure.
    pub async fn request_screenshot(
        &self,
        page_info: PageInfo,
        timeout: Duration,
    ) -> Option<String> {
        let delivery = self
            .send_with_timeout(BridgeMessage::CaptureScreenshot { page_info }, timeout)
            .await;
        match delivery.reply {
            Some(BridgeReply::Screenshot { data_url }) => data_url,
            _ => None,
        }
    }
}
