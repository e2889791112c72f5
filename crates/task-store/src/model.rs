use serde::{Deserialize, Serialize};

use soultrace_core_types::{EpochMillis, EventRecord, TaskId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Recording,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Recording => "recording",
            TaskStatus::Completed => "completed",
        }
    }
}

/// Navigation intent written just before a page is torn down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNavigation {
    pub from_url: String,
    #[serde(default)]
    pub title: String,
    pub at: EpochMillis,
    #[serde(default)]
    pub after_click: bool,
}

/// Durable record of one recorded task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<EpochMillis>,
    #[serde(default)]
    pub start_url: String,
    #[serde(default)]
    pub end_url: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub events: Vec<EventRecord>,
    #[serde(default)]
    pub has_video: bool,
    /// Bumped by the store on every successful write.
    #[serde(default)]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_navigation: Option<PendingNavigation>,
}

impl TaskRecord {
    pub fn new(id: TaskId, start_url: impl Into<String>, start_time: EpochMillis) -> Self {
        let start_url = start_url.into();
        Self {
            title: format!("Task {}", id.as_str()),
            id,
            description: String::new(),
            start_time,
            end_time: None,
            end_url: start_url.clone(),
            start_url,
            status: TaskStatus::Recording,
            events: Vec::new(),
            has_video: false,
            revision: 0,
            pending_navigation: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn is_recording(&self) -> bool {
        self.status == TaskStatus::Recording
    }

    pub fn last_timestamp(&self) -> Option<EpochMillis> {
        self.events.last().map(|event| event.timestamp)
    }

    /// Appends `events` keeping the log time-ordered. A late event older than
    /// the tail is placed after every event with an equal or earlier stamp.
    pub fn append_events<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = EventRecord>,
    {
        for event in events {
            let at_tail = self
                .last_timestamp()
                .map_or(true, |last| event.timestamp >= last);
            if at_tail {
                if !event.url.is_empty() {
                    self.end_url = event.url.clone();
                }
                self.events.push(event);
            } else {
                let pos = self
                    .events
                    .partition_point(|stored| stored.timestamp <= event.timestamp);
                self.events.insert(pos, event);
            }
        }
    }

    /// Appends the events not already present and returns how many were new.
    /// Lets a whole buffer be re-sent without duplicating what was stored.
    pub fn merge_events<'a, I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let fresh: Vec<EventRecord> = events
            .into_iter()
            .filter(|event| !self.contains_event(event))
            .cloned()
            .collect();
        let count = fresh.len();
        self.append_events(fresh);
        count
    }

    /// Matches on `event_id`. Records written without one fall back to full
    /// equality against the tail at or after the candidate's timestamp.
    pub fn contains_event(&self, candidate: &EventRecord) -> bool {
        if !candidate.event_id.is_empty() {
            return self
                .events
                .iter()
                .any(|event| event.event_id == candidate.event_id);
        }
        self.events
            .iter()
            .rev()
            .take_while(|event| event.timestamp >= candidate.timestamp)
            .any(|event| event == candidate)
    }

    /// Marks the task completed. Returns `false` when it already was.
    pub fn complete(&mut self, at: EpochMillis) -> bool {
        if self.status == TaskStatus::Completed {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.end_time = Some(at.max(self.start_time));
        self.pending_navigation = None;
        true
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            event_count: self.events.len(),
            start_time: self.start_time,
            end_time: self.end_time,
            start_url: self.start_url.clone(),
        }
    }
}

/// Listing row for a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub event_count: usize,
    pub start_time: EpochMillis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<EpochMillis>,
    pub start_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use soultrace_core_types::EventType;

    #[test]
    fn record_serializes_with_wire_names() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 10);
        record.append_events([EventRecord::new(EventType::PageLoad, 10, "https://a/")]);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "recording");
        assert_eq!(value["startUrl"], "https://a/");
        assert_eq!(value["events"][0]["type"], "page_load");
        assert!(value.get("endTime").is_none());
    }

    #[test]
    fn append_tracks_end_url() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 0);
        record.append_events([
            EventRecord::new(EventType::Click, 1, "https://a/"),
            EventRecord::new(EventType::PageLoad, 2, "https://a/b"),
        ]);
        assert_eq!(record.end_url, "https://a/b");
        assert_eq!(record.last_timestamp(), Some(2));
    }

    #[test]
    fn late_events_are_placed_in_time_order() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 0);
        record.append_events([
            EventRecord::new(EventType::PageLoad, 1, "https://a/"),
            EventRecord::new(EventType::PageLoad, 9, "https://a/c"),
            EventRecord::new(EventType::PageLoad, 4, "https://a/b"),
        ]);
        let stamps: Vec<_> = record.events.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, [1, 4, 9]);
        assert_eq!(record.end_url, "https://a/c");
    }

    #[test]
    fn merge_skips_stored_events() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 0);
        let load = EventRecord::new(EventType::PageLoad, 1, "https://a/");
        let nav = EventRecord::new(EventType::Navigation, 5, "https://a/");
        record.append_events([load.clone()]);
        assert_eq!(record.merge_events([&load, &nav]), 1);
        assert_eq!(record.merge_events([&load, &nav]), 0);
        assert_eq!(record.events.len(), 2);
        assert!(!record.contains_event(&EventRecord::new(EventType::PageLoad, 5, "https://a/")));
    }

    #[test]
    fn identical_events_with_distinct_ids_are_both_kept() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 0);
        let first = EventRecord::new(EventType::Click, 7, "https://a/").with_event_id("e1");
        let second = EventRecord::new(EventType::Click, 7, "https://a/").with_event_id("e2");
        assert_eq!(record.merge_events([&first]), 1);
        assert_eq!(record.merge_events([&first, &second]), 1);
        assert_eq!(record.merge_events([&second]), 0);
        assert_eq!(record.events.len(), 2);

        let mut edited = first.clone();
        edited.timestamp = 1;
        assert!(record.contains_event(&edited));
    }

    #[test]
    fn complete_is_idempotent() {
        let mut record = TaskRecord::new(TaskId::from("T1"), "https://a/", 100);
        record.pending_navigation = Some(PendingNavigation::default());
        assert!(record.complete(50));
        assert_eq!(record.end_time, Some(100));
        assert!(record.pending_navigation.is_none());
        assert!(!record.complete(500));
        assert_eq!(record.end_time, Some(100));
    }
}
