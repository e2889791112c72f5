use std::time::Duration;

use serde::{Deserialize, Serialize};

use soultrace_core_types::EventType;

/// When a screenshot is requested for a recorded event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenshotMode {
    Off,
    /// `click` and `mouseup` only.
    ClickClass,
    /// Any event whose target is interactive.
    Interactive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturePolicyView {
    pub filter: FilterThresholds,
    pub dispatch: DispatchWindows,
    pub screenshot: ScreenshotPolicy,
    pub stop: StopPolicy,
    /// Watch for inserted elements and record `element_added`.
    pub observe_mutations: bool,
    /// Send each kept event to the bridge as it is recorded. When off, events
    /// only leave the buffer at stop or unload.
    pub stream_events: bool,
}

impl Default for CapturePolicyView {
    fn default() -> Self {
        Self {
            filter: FilterThresholds::default(),
            dispatch: DispatchWindows::default(),
            screenshot: ScreenshotPolicy::default(),
            stop: StopPolicy::default(),
            observe_mutations: true,
            stream_events: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    pub duplicate_click_ms: i64,
    pub scroll_min_delta: f64,
    pub debounce_ms: i64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            duplicate_click_ms: 25,
            scroll_min_delta: 50.0,
            debounce_ms: 300,
        }
    }
}

/// Trailing windows applied before the filter sees an occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchWindows {
    pub input_ms: i64,
    pub scroll_ms: i64,
}

impl DispatchWindows {
    pub fn window_for(&self, kind: EventType) -> Option<i64> {
        match kind {
            EventType::Input | EventType::Change => Some(self.input_ms),
            EventType::Scroll => Some(self.scroll_ms),
            _ => None,
        }
    }
}

impl Default for DispatchWindows {
    fn default() -> Self {
        Self {
            input_ms: 500,
            scroll_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotPolicy {
    pub mode: ScreenshotMode,
    pub timeout_ms: u64,
}

impl ScreenshotPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ScreenshotPolicy {
    fn default() -> Self {
        Self {
            mode: ScreenshotMode::Off,
            timeout_ms: 1_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    /// Upper bound for a stop command, forced path included.
    pub budget_ms: u64,
    /// Part of the budget held back for the forced path.
    pub force_reserve_ms: u64,
}

impl StopPolicy {
    pub fn graceful(&self) -> Duration {
        Duration::from_millis(self.budget_ms.saturating_sub(self.force_reserve_ms))
    }

    pub fn force_reserve(&self) -> Duration {
        Duration::from_millis(self.force_reserve_ms.min(self.budget_ms))
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            budget_ms: 2_000,
            force_reserve_ms: 500,
        }
    }
}
