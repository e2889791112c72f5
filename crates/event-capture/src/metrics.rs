use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::filter::DropReason;

#[derive(Clone, Default)]
pub struct CaptureMetrics {
    inner: Arc<CaptureMetricsInner>,
}

#[derive(Default)]
struct CaptureMetricsInner {
    kept: AtomicU64,
    duplicate_click: AtomicU64,
    unchanged_input: AtomicU64,
    small_scroll: AtomicU64,
    hover_noise: AtomicU64,
    debounced: AtomicU64,
    discarded: AtomicU64,
    navigations: AtomicU64,
    elements_added: AtomicU64,
    screenshots: AtomicU64,
    forced_stops: AtomicU64,
}

impl CaptureMetrics {
    pub fn record_kept(&self) {
        self.inner.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::DuplicateClick => &self.inner.duplicate_click,
            DropReason::UnchangedInput => &self.inner.unchanged_input,
            DropReason::SmallScroll => &self.inner.small_scroll,
            DropReason::HoverNoise => &self.inner.hover_noise,
            DropReason::Debounced => &self.inner.debounced,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Occurrences lost to a missing or invalid target.
    pub fn record_discarded(&self) {
        self.inner.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_navigation(&self) {
        self.inner.navigations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_element_added(&self, count: usize) {
        self.inner
            .elements_added
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_screenshot(&self) {
        self.inner.screenshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forced_stop(&self) {
        self.inner.forced_stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureMetricSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CaptureMetricSnapshot {
            kept: load(&self.inner.kept),
            duplicate_click: load(&self.inner.duplicate_click),
            unchanged_input: load(&self.inner.unchanged_input),
            small_scroll: load(&self.inner.small_scroll),
            hover_noise: load(&self.inner.hover_noise),
            debounced: load(&self.inner.debounced),
            discarded: load(&self.inner.discarded),
            navigations: load(&self.inner.navigations),
            elements_added: load(&self.inner.elements_added),
            screenshots: load(&self.inner.screenshots),
            forced_stops: load(&self.inner.forced_stops),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CaptureMetricSnapshot {
    pub kept: u64,
    pub duplicate_click: u64,
    pub unchanged_input: u64,
    pub small_scroll: u64,
    pub hover_noise: u64,
    pub debounced: u64,
    pub discarded: u64,
    pub navigations: u64,
    pub elements_added: u64,
    pub screenshots: u64,
    pub forced_stops: u64,
}

impl CaptureMetricSnapshot {
    pub fn dropped(&self) -> u64 {
        self.duplicate_click
            + self.unchanged_input
            + self.small_scroll
            + self.hover_noise
            + self.debounced
    }
}
