use soultrace_core_types::{EventType, TaskId};
use tracing::{debug, info, warn};

use crate::filter::DropReason;
use crate::metrics::{CaptureMetricSnapshot, CaptureMetrics};
use crate::model::SessionResponse;

pub fn emit_kept(metrics: &CaptureMetrics, task: &TaskId, kind: EventType, timestamp: i64) {
    metrics.record_kept();
    debug!(
        target: "capture.events",
        task = %task,
        kind = kind.as_str(),
        timestamp,
        "capture.event.kept"
    );
}

pub fn emit_dropped(metrics: &CaptureMetrics, kind: EventType, reason: DropReason) {
    metrics.record_drop(reason);
    debug!(
        target: "capture.events",
        kind = kind.as_str(),
        reason = reason.as_str(),
        "capture.event.dropped"
    );
}

pub fn emit_discarded(metrics: &CaptureMetrics, kind: EventType, error: &dyn std::error::Error) {
    metrics.record_discarded();
    debug!(
        target: "capture.events",
        kind = kind.as_str(),
        error = %error,
        "capture.event.discarded"
    );
}

pub fn emit_navigation(
    metrics: &CaptureMetrics,
    task: &TaskId,
    from: &str,
    to: &str,
    after_click: bool,
) {
    metrics.record_navigation();
    info!(
        target: "capture.events",
        task = %task,
        from,
        to,
        after_click,
        "capture.navigation"
    );
}

pub fn emit_started(task: &TaskId, url: &str, restored: usize) {
    info!(
        target: "capture.events",
        task = %task,
        url,
        restored,
        "capture.session.started"
    );
}

pub fn emit_stopped(
    task: &TaskId,
    response: &SessionResponse,
    buffered: usize,
    snapshot: &CaptureMetricSnapshot,
) {
    if *response == SessionResponse::Stopped {
        info!(
            target: "capture.events",
            task = %task,
            status = response.as_str(),
            buffered,
            kept = snapshot.kept,
            dropped = snapshot.dropped(),
            "capture.session.stopped"
        );
    } else {
        warn!(
            target: "capture.events",
            task = %task,
            status = response.as_str(),
            buffered,
            kept = snapshot.kept,
            dropped = snapshot.dropped(),
            "capture.session.stopped"
        );
    }
}
