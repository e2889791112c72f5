//! Runtime configuration.
//!
//! One YAML document with a section per subsystem. Every field has a default,
//! so an empty or partial file is valid.

use serde::{Deserialize, Serialize};

use event_capture::CapturePolicyView;
use persistence_bridge::BridgePolicyView;
use soultrace_task_store::{StoreBackend, TaskStoreConfig};

/// Top-level keys of the configuration document.
pub const SECTIONS: [&str; 3] = ["storage", "capture", "bridge"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: TaskStoreConfig,
    pub capture: CapturePolicyView,
    pub bridge: BridgePolicyView,
}

impl Config {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Settings that parse but cannot work together. Empty when usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut require = |ok: bool, message: String| {
            if !ok {
                problems.push(message);
            }
        };

        if self.storage.backend == StoreBackend::File {
            require(
                !self.storage.root.as_os_str().is_empty(),
                "storage.root must be set for the file backend".into(),
            );
        }
        require(
            self.storage.update_retries > 0,
            "storage.update_retries must be at least 1".into(),
        );

        let capture = &self.capture;
        require(
            capture.filter.duplicate_click_ms >= 0 && capture.filter.debounce_ms >= 0,
            "capture.filter windows cannot be negative".into(),
        );
        require(
            capture.filter.scroll_min_delta >= 0.0,
            format!(
                "capture.filter.scroll_min_delta must be >= 0, got {}",
                capture.filter.scroll_min_delta
            ),
        );
        require(
            capture.dispatch.input_ms >= 0 && capture.dispatch.scroll_ms >= 0,
            "capture.dispatch windows cannot be negative".into(),
        );
        require(
            capture.screenshot.timeout_ms > 0,
            "capture.screenshot.timeout_ms must be positive".into(),
        );
        require(
            capture.stop.budget_ms > 0,
            "capture.stop.budget_ms must be positive".into(),
        );
        require(
            capture.stop.force_reserve_ms <= capture.stop.budget_ms,
            format!(
                "capture.stop.force_reserve_ms ({}) exceeds capture.stop.budget_ms ({})",
                capture.stop.force_reserve_ms, capture.stop.budget_ms
            ),
        );

        require(
            self.bridge.send_timeout_ms > 0,
            "bridge.send_timeout_ms must be positive".into(),
        );
        require(
            self.bridge.relay_queue > 0,
            "bridge.relay_queue must be at least 1".into(),
        );
        require(
            self.bridge.update_retries > 0,
            "bridge.update_retries must be at least 1".into(),
        );
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let raw = r#"
storage:
  backend: memory
capture:
  filter:
    scroll_min_delta: 80
  stop:
    budget_ms: 3000
"#;
        let config = Config::from_yaml(raw).unwrap();
        assert_eq!(config.storage.backend, StoreBackend::Memory);
        assert_eq!(config.capture.filter.scroll_min_delta, 80.0);
        assert_eq!(config.capture.filter.duplicate_click_ms, 25);
        assert_eq!(config.capture.stop.budget_ms, 3_000);
        assert_eq!(config.capture.stop.force_reserve_ms, 500);
        assert_eq!(config.bridge, BridgePolicyView::default());
    }

    #[test]
    fn defaults_have_no_problems() {
        assert!(Config::default().problems().is_empty());
    }

    #[test]
    fn reserve_larger_than_budget_is_reported() {
        let raw = r#"
capture:
  stop:
    budget_ms: 400
    force_reserve_ms: 500
bridge:
  relay_queue: 0
"#;
        let problems = Config::from_yaml(raw).unwrap().problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("force_reserve_ms (500)"));
        assert!(problems[1].starts_with("bridge.relay_queue"));
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }
}
