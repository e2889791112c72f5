use soultrace_core_types::{EpochMillis, EventType};
use soultrace_dom_model::NodeId;

use crate::model::Occurrence;
use crate::policy::DispatchWindows;

type StreamKey = (EventType, Option<NodeId>);

#[derive(Clone, Debug)]
struct Pending {
    key: StreamKey,
    occurrence: Occurrence,
    due: EpochMillis,
}

/// Trailing debounce for continuous gestures (typing, scrolling).
///
/// Only one stream is held at a time: an occurrence from any other stream
/// releases the held one first, so the relative order of released
/// occurrences always matches arrival order.
#[derive(Clone, Debug)]
pub struct DispatchDebouncer {
    windows: DispatchWindows,
    pending: Option<Pending>,
}

impl DispatchDebouncer {
    pub fn new(windows: DispatchWindows) -> Self {
        Self {
            windows,
            pending: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accepts `occ` and returns whatever is ready to go downstream.
    pub fn offer(&mut self, occ: Occurrence, now: EpochMillis) -> Vec<Occurrence> {
        let key = (occ.kind, occ.target);
        let mut released = Vec::new();
        if self.pending.as_ref().is_some_and(|p| p.key != key) {
            released.extend(self.pending.take().map(|p| p.occurrence));
        }
        match self.windows.window_for(occ.kind) {
            Some(window) => {
                self.pending = Some(Pending {
                    key,
                    occurrence: occ,
                    due: now.saturating_add(window),
                });
            }
            None => released.push(occ),
        }
        released
    }

    /// Releases the held occurrence once its window has elapsed.
    pub fn drain_due(&mut self, now: EpochMillis) -> Option<Occurrence> {
        if self.pending.as_ref().is_some_and(|p| p.due <= now) {
            return self.pending.take().map(|p| p.occurrence);
        }
        None
    }

    pub fn flush_all(&mut self) -> Option<Occurrence> {
        self.pending.take().map(|p| p.occurrence)
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> DispatchDebouncer {
        DispatchDebouncer::new(DispatchWindows::default())
    }

    #[test]
    fn typing_burst_keeps_only_latest_value() {
        let mut d = debouncer();
        let field = NodeId(4);
        assert!(d.offer(Occurrence::input(field, "r", 0), 0).is_empty());
        assert!(d.offer(Occurrence::input(field, "ru", 80), 80).is_empty());
        assert!(d.offer(Occurrence::input(field, "rus", 160), 160).is_empty());
        assert!(d.drain_due(600).is_none());
        let released = d.drain_due(660).expect("window elapsed");
        assert_eq!(released.value.as_deref(), Some("rus"));
        assert!(!d.has_pending());
    }

    #[test]
    fn other_stream_releases_held_occurrence_first() {
        let mut d = debouncer();
        let field = NodeId(4);
        d.offer(Occurrence::input(field, "hello", 0), 0);
        let out = d.offer(Occurrence::click(NodeId(7), 50), 50);
        let kinds: Vec<_> = out.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, [EventType::Input, EventType::Click]);
        assert!(d.flush_all().is_none());
    }

    #[test]
    fn window_at_the_end_of_time_saturates() {
        let mut d = debouncer();
        d.offer(Occurrence::input(NodeId(4), "x", i64::MAX), i64::MAX);
        assert!(d.drain_due(i64::MAX).is_some());
    }

    #[test]
    fn non_debounced_kinds_pass_straight_through() {
        let mut d = debouncer();
        let out = d.offer(Occurrence::click(NodeId(1), 5), 5);
        assert_eq!(out.len(), 1);
        assert!(!d.has_pending());
    }
}
