use serde::{Deserialize, Serialize};

use soultrace_core_types::{
    EpochMillis, EventType, KeyboardDetails, PointerDetails, ScrollDetails, TaskId,
};
use soultrace_dom_model::NodeId;

/// A raw platform occurrence before filtering and normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub kind: EventType,
    #[serde(default)]
    pub target: Option<NodeId>,
    pub timestamp: EpochMillis,
    /// Form value reported with `input`/`change`; read from the node when absent.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub pointer: Option<PointerDetails>,
    #[serde(default)]
    pub keyboard: Option<KeyboardDetails>,
    #[serde(default)]
    pub scroll: Option<ScrollDetails>,
}

impl Occurrence {
    pub fn new(kind: EventType, target: Option<NodeId>, timestamp: EpochMillis) -> Self {
        Self {
            kind,
            target,
            timestamp,
            value: None,
            pointer: None,
            keyboard: None,
            scroll: None,
        }
    }

    pub fn on(kind: EventType, target: NodeId, timestamp: EpochMillis) -> Self {
        Self::new(kind, Some(target), timestamp)
    }

    pub fn click(target: NodeId, timestamp: EpochMillis) -> Self {
        Self::on(EventType::Click, target, timestamp)
    }

    pub fn input(target: NodeId, value: impl Into<String>, timestamp: EpochMillis) -> Self {
        let mut occ = Self::on(EventType::Input, target, timestamp);
        occ.value = Some(value.into());
        occ
    }

    pub fn scroll(target: NodeId, delta_x: f64, delta_y: f64, timestamp: EpochMillis) -> Self {
        let mut occ = Self::on(EventType::Scroll, target, timestamp);
        occ.scroll = Some(ScrollDetails {
            delta_x,
            delta_y,
            scroll_x: None,
            scroll_y: None,
        });
        occ
    }

    pub fn key(kind: EventType, target: NodeId, key: &str, timestamp: EpochMillis) -> Self {
        let mut occ = Self::on(kind, target, timestamp);
        occ.keyboard = Some(KeyboardDetails {
            key: key.to_string(),
            code: String::new(),
            repeat: false,
            modifiers: Default::default(),
        });
        occ
    }

    pub fn with_pointer(mut self, pointer: PointerDetails) -> Self {
        self.pointer = Some(pointer);
        self
    }

    /// Largest absolute scroll delta on either axis.
    pub fn scroll_magnitude(&self) -> f64 {
        self.scroll
            .as_ref()
            .map(|s| s.delta_x.abs().max(s.delta_y.abs()))
            .unwrap_or(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Recording,
    Stopping,
}

/// Commands sent by the controlling UI to a capture context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionCommand {
    StartRecording { task_id: TaskId },
    StopRecording,
}

/// The single answer produced for every lifecycle command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionResponse {
    Started,
    Stopped,
    ForceStoppedDueToTimeout,
    ForceStoppedDueToError,
    Failed { reason: String },
}

impl SessionResponse {
    pub fn as_str(&self) -> &str {
        match self {
            SessionResponse::Started => "started",
            SessionResponse::Stopped => "stopped",
            SessionResponse::ForceStoppedDueToTimeout => "force-stopped-due-to-timeout",
            SessionResponse::ForceStoppedDueToError => "force-stopped-due-to-error",
            SessionResponse::Failed { .. } => "failed",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            SessionResponse::Stopped
                | SessionResponse::ForceStoppedDueToTimeout
                | SessionResponse::ForceStoppedDueToError
        )
    }
}

impl Serialize for SessionResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", self.as_str())?;
        if let SessionResponse::Failed { reason } = self {
            map.serialize_entry("reason", reason)?;
        }
        map.end()
    }
}
