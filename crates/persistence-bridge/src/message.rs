//! Wire protocol between capture contexts and the background relay.

use serde::{Deserialize, Serialize};
use url::Url;

use soultrace_core_types::{EpochMillis, EventRecord, PageInfo, TaskId};
use soultrace_task_store::{PendingNavigation, TaskRecord};

use crate::errors::BridgeError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeMessage {
    /// Load the task for a starting session, creating it when missing. The
    /// relay consumes any pending-navigation marker and returns it in the
    /// reply.
    OpenTask {
        task_id: TaskId,
        page: PageInfo,
        at: EpochMillis,
    },
    RecordedEvent {
        task_id: TaskId,
        event: EventRecord,
    },
    /// Buffer persisted at a boundary (stop, unload). Events already stored
    /// are skipped by the relay.
    FlushBuffer {
        task_id: TaskId,
        events: Vec<EventRecord>,
    },
    CompleteTask {
        task_id: TaskId,
        at: EpochMillis,
    },
    PendingNavigation {
        task_id: TaskId,
        pending: PendingNavigation,
    },
    CaptureScreenshot {
        page_info: PageInfo,
    },
    TabUpdated {
        task_id: TaskId,
        url: String,
        #[serde(default)]
        title: String,
    },
    TabRemoved {
        task_id: TaskId,
        at: EpochMillis,
    },
}

impl BridgeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeMessage::OpenTask { .. } => "openTask",
            BridgeMessage::RecordedEvent { .. } => "recordedEvent",
            BridgeMessage::FlushBuffer { .. } => "flushBuffer",
            BridgeMessage::CompleteTask { .. } => "completeTask",
            BridgeMessage::PendingNavigation { .. } => "pendingNavigation",
            BridgeMessage::CaptureScreenshot { .. } => "captureScreenshot",
            BridgeMessage::TabUpdated { .. } => "tabUpdated",
            BridgeMessage::TabRemoved { .. } => "tabRemoved",
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            BridgeMessage::OpenTask { task_id, .. }
            | BridgeMessage::RecordedEvent { task_id, .. }
            | BridgeMessage::FlushBuffer { task_id, .. }
            | BridgeMessage::CompleteTask { task_id, .. }
            | BridgeMessage::PendingNavigation { task_id, .. }
            | BridgeMessage::TabUpdated { task_id, .. }
            | BridgeMessage::TabRemoved { task_id, .. } => Some(task_id),
            BridgeMessage::CaptureScreenshot { .. } => None,
        }
    }

    /// Whether losing this message loses recorded data. Only those are worth
    /// a backup-log entry.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            BridgeMessage::OpenTask { .. } | BridgeMessage::CaptureScreenshot { .. }
        )
    }

    /// Shape check run before anything leaves the capture context.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if let Some(task_id) = self.task_id() {
            if task_id.is_empty() {
                return Err(BridgeError::InvalidPayload("empty task id".into()));
            }
        }
        match self {
            BridgeMessage::OpenTask { page, .. } => check_url(&page.url),
            BridgeMessage::RecordedEvent { event, .. } => validate_event(event),
            BridgeMessage::FlushBuffer { events, .. } => {
                let mut last = EpochMillis::MIN;
                for event in events {
                    validate_event(event)?;
                    if event.timestamp < last {
                        return Err(BridgeError::InvalidPayload(
                            "buffer timestamps go backwards".into(),
                        ));
                    }
                    last = event.timestamp;
                }
                Ok(())
            }
            BridgeMessage::PendingNavigation { pending, .. } => check_url(&pending.from_url),
            BridgeMessage::CaptureScreenshot { page_info } => check_url(&page_info.url),
            BridgeMessage::TabUpdated { url, .. } => check_url(url),
            BridgeMessage::CompleteTask { .. } | BridgeMessage::TabRemoved { .. } => Ok(()),
        }
    }
}

fn validate_event(event: &EventRecord) -> Result<(), BridgeError> {
    if event.timestamp < 0 {
        return Err(BridgeError::InvalidPayload(format!(
            "negative timestamp on {}",
            event.event_type
        )));
    }
    if event.event_type.requires_target() && event.target.is_none() {
        return Err(BridgeError::InvalidPayload(format!(
            "{} event without target",
            event.event_type
        )));
    }
    check_url(&event.url)
}

/// Empty urls are allowed (unknown page); anything else must parse.
fn check_url(raw: &str) -> Result<(), BridgeError> {
    if raw.is_empty() {
        return Ok(());
    }
    Url::parse(raw)
        .map(|_| ())
        .map_err(|err| BridgeError::InvalidPayload(format!("bad url {raw:?}: {err}")))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeReply {
    /// `applied` is false when the relay had nothing to change.
    Ack { applied: bool },
    Task { record: TaskRecord },
    Screenshot { data_url: Option<String> },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use soultrace_core_types::{EventType, TargetDescriptor};

    #[test]
    fn messages_use_camel_case_tags() {
        let msg = BridgeMessage::RecordedEvent {
            task_id: TaskId::from("T1"),
            event: EventRecord::new(EventType::PageLoad, 1, "https://a/"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "recordedEvent");
        assert_eq!(value["taskId"], "T1");
        assert_eq!(value["event"]["type"], "page_load");
    }

    #[test]
    fn validation_rejects_malformed_events() {
        let no_target = BridgeMessage::RecordedEvent {
            task_id: TaskId::from("T1"),
            event: EventRecord::new(EventType::Click, 1, "https://a/"),
        };
        assert!(no_target.validate().is_err());

        let bad_url = BridgeMessage::RecordedEvent {
            task_id: TaskId::from("T1"),
            event: EventRecord::new(EventType::Click, 1, "not a url")
                .with_target(TargetDescriptor::default()),
        };
        assert!(bad_url.validate().is_err());

        let empty_task = BridgeMessage::CompleteTask {
            task_id: TaskId::from(""),
            at: 0,
        };
        assert!(empty_task.validate().is_err());
    }

    #[test]
    fn flush_buffer_must_be_ordered() {
        let msg = BridgeMessage::FlushBuffer {
            task_id: TaskId::from("T1"),
            events: vec![
                EventRecord::new(EventType::PageLoad, 5, "https://a/"),
                EventRecord::new(EventType::PageLoad, 4, "https://a/"),
            ],
        };
        assert!(msg.validate().is_err());
    }
}
