//! Recording session state machine.
//!
//! One [`RecordingSession`] lives in each capture context. It owns the
//! [`SessionState`] explicitly and threads it through the filter and the
//! normalizer; nothing about a session is kept in globals.

use std::sync::Arc;

use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use persistence_bridge::{Delivery, DeliveryStatus, PersistenceBridge};
use soultrace_core_types::{
    ContextId, EpochMillis, EventRecord, EventType, NavigationDetails, PageInfo, TaskId,
};
use soultrace_dom_model::{DomDocument, NodeId};
use soultrace_task_store::{update_task, PendingNavigation, TaskRecord, TaskStore};

use crate::debounce::DispatchDebouncer;
use crate::errors::CaptureError;
use crate::events;
use crate::filter::{should_ignore, FilterState};
use crate::injection::{InjectionGuard, InjectionRegistry};
use crate::metrics::CaptureMetrics;
use crate::model::{Occurrence, SessionCommand, SessionPhase, SessionResponse};
use crate::normalizer::{normalize, NormalizeContext};
use crate::policy::{CapturePolicyView, ScreenshotMode};
use crate::ports::{CaptureHost, Clock, SystemClock};

/// Mutable per-session data. Reset wholesale on stop.
#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    task_id: Option<TaskId>,
    buffer: Vec<EventRecord>,
    filter: FilterState,
    debouncer: DispatchDebouncer,
    /// Open mousedown pairing: target and correlation id.
    correlation: Option<(NodeId, String)>,
    listeners_attached: bool,
    observing: bool,
}

impl SessionState {
    fn idle(policy: &CapturePolicyView) -> Self {
        Self {
            phase: SessionPhase::Idle,
            task_id: None,
            buffer: Vec::new(),
            filter: FilterState::default(),
            debouncer: DispatchDebouncer::new(policy.dispatch.clone()),
            correlation: None,
            listeners_attached: false,
            observing: false,
        }
    }

    fn last_timestamp(&self) -> Option<EpochMillis> {
        self.buffer.last().map(|event| event.timestamp)
    }
}

pub struct SessionBuilder {
    context: ContextId,
    host: Arc<dyn CaptureHost>,
    bridge: Arc<PersistenceBridge>,
    policy: CapturePolicyView,
    store: Option<Arc<dyn TaskStore>>,
    clock: Arc<dyn Clock>,
    page: PageInfo,
}

impl SessionBuilder {
    pub fn context(mut self, context: ContextId) -> Self {
        self.context = context;
        self
    }

    pub fn policy(mut self, policy: CapturePolicyView) -> Self {
        self.policy = policy;
        self
    }

    /// Direct store handle used only by the forced-stop and unload paths
    /// when the bridge cannot deliver.
    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn page(mut self, page: PageInfo) -> Self {
        self.page = page;
        self
    }

    pub fn build(self) -> RecordingSession {
        RecordingSession {
            state: SessionState::idle(&self.policy),
            context: self.context,
            host: self.host,
            bridge: self.bridge,
            policy: self.policy,
            store: self.store,
            clock: self.clock,
            page: self.page,
            metrics: CaptureMetrics::default(),
            _guard: None,
        }
    }

    /// Builds the session only if no capture layer is live in this context.
    pub fn inject(self, registry: &InjectionRegistry) -> Option<RecordingSession> {
        let Some(guard) = registry.claim(&self.context) else {
            debug!(
                target: "capture.events",
                context = %self.context,
                "capture layer already live, skipping injection"
            );
            return None;
        };
        let mut session = self.build();
        session._guard = Some(guard);
        Some(session)
    }
}

pub struct RecordingSession {
    context: ContextId,
    host: Arc<dyn CaptureHost>,
    bridge: Arc<PersistenceBridge>,
    policy: CapturePolicyView,
    store: Option<Arc<dyn TaskStore>>,
    clock: Arc<dyn Clock>,
    page: PageInfo,
    state: SessionState,
    metrics: CaptureMetrics,
    _guard: Option<InjectionGuard>,
}

impl RecordingSession {
    pub fn builder(host: Arc<dyn CaptureHost>, bridge: Arc<PersistenceBridge>) -> SessionBuilder {
        SessionBuilder {
            context: ContextId::new(),
            host,
            bridge,
            policy: CapturePolicyView::default(),
            store: None,
            clock: Arc::new(SystemClock),
            page: PageInfo::default(),
        }
    }

    pub fn context(&self) -> &ContextId {
        &self.context
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn is_recording(&self) -> bool {
        self.state.phase == SessionPhase::Recording
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.state.task_id.as_ref()
    }

    pub fn buffer(&self) -> &[EventRecord] {
        &self.state.buffer
    }

    pub fn page(&self) -> &PageInfo {
        &self.page
    }

    /// Tells the session which page its context is on.
    pub fn set_page(&mut self, page: PageInfo) {
        self.page = page;
    }

    pub fn policy(&self) -> &CapturePolicyView {
        &self.policy
    }

    pub fn metrics(&self) -> CaptureMetrics {
        self.metrics.clone()
    }

    pub async fn handle_command(
        &mut self,
        doc: &DomDocument,
        command: SessionCommand,
    ) -> SessionResponse {
        match command {
            SessionCommand::StartRecording { task_id } => self.start(doc, task_id).await,
            SessionCommand::StopRecording => self.stop(doc).await,
        }
    }

    /// `Idle -> Recording`. Restores the task's stored events, attaches
    /// listeners and records the page load. Starting the task that is
    /// already recording is a no-op.
    pub async fn start(&mut self, doc: &DomDocument, task_id: TaskId) -> SessionResponse {
        if task_id.is_empty() {
            return SessionResponse::Failed {
                reason: CaptureError::InvalidTask.to_string(),
            };
        }
        if self.state.phase != SessionPhase::Idle {
            if self.state.task_id.as_ref() == Some(&task_id) {
                return SessionResponse::Started;
            }
            self.stop(doc).await;
        }

        if self.state.listeners_attached {
            if let Err(err) = self.host.detach_listeners().await {
                debug!(target: "capture.events", error = %err, "stale listeners not detached");
            }
            self.state.listeners_attached = false;
        }
        if let Err(err) = self.host.attach_listeners().await {
            warn!(
                target: "capture.events",
                task = %task_id,
                error = %err,
                "capture.session.start_failed"
            );
            self.reset();
            return SessionResponse::Failed {
                reason: err.to_string(),
            };
        }
        self.state.listeners_attached = true;

        let now = self.clock.now_millis();
        let stored = self.bridge.open_task(&task_id, self.page.clone(), now).await;
        let (buffer, pending) = match stored {
            Some(record) => (record.events, record.pending_navigation),
            None => (Vec::new(), None),
        };
        let restored = buffer.len();

        self.state.phase = SessionPhase::Recording;
        self.state.task_id = Some(task_id.clone());
        self.state.buffer = buffer;
        self.state.filter = FilterState::default();
        self.state.debouncer.clear();
        self.state.correlation = None;

        if self.policy.observe_mutations {
            match self.host.observe_mutations().await {
                Ok(()) => self.state.observing = true,
                Err(err) => {
                    warn!(target: "capture.events", error = %err, "mutation watch unavailable")
                }
            }
        }

        if let Some(pending) = pending.filter(|p| p.from_url != self.page.url) {
            let navigation = EventRecord::new(EventType::Navigation, now, self.page.url.clone())
                .with_navigation(NavigationDetails {
                    from_url: pending.from_url.clone(),
                    to_url: self.page.url.clone(),
                    title: self.page.title.clone(),
                    referrer: self.page.referrer.clone(),
                    after_click: pending.after_click,
                    cross_document: true,
                });
            events::emit_navigation(
                &self.metrics,
                &task_id,
                &pending.from_url,
                &self.page.url,
                pending.after_click,
            );
            self.record(navigation).await;
        }
        let load = EventRecord::new(EventType::PageLoad, now, self.page.url.clone());
        self.record(load).await;

        events::emit_started(&task_id, &self.page.url, restored);
        SessionResponse::Started
    }

    /// Runs `occ` through filter, normalizer and the buffer right away,
    /// bypassing the dispatch debouncer.
    pub async fn submit(&mut self, doc: &DomDocument, occ: Occurrence) -> Option<EventRecord> {
        if !self.is_recording() {
            return None;
        }
        self.process(doc, occ).await
    }

    /// Entry point for platform occurrences: debounces continuous streams
    /// and submits whatever is ready.
    pub async fn dispatch(&mut self, doc: &DomDocument, occ: Occurrence) -> Vec<EventRecord> {
        if !self.is_recording() {
            return Vec::new();
        }
        let now = self.clock.now_millis();
        let ready = self.state.debouncer.offer(occ, now);
        let mut kept = Vec::with_capacity(ready.len());
        for occ in ready {
            kept.extend(self.process(doc, occ).await);
        }
        kept
    }

    /// Releases a debounced occurrence whose window has elapsed.
    pub async fn tick(&mut self, doc: &DomDocument) -> Option<EventRecord> {
        if !self.is_recording() {
            return None;
        }
        let now = self.clock.now_millis();
        let occ = self.state.debouncer.drain_due(now)?;
        self.process(doc, occ).await
    }

    /// Same-document URL change. Records one navigation event when the URL
    /// actually changed.
    pub async fn navigate(
        &mut self,
        doc: &DomDocument,
        to_url: &str,
        title: &str,
    ) -> Option<EventRecord> {
        if !self.is_recording() {
            return None;
        }
        self.flush_pending(doc).await;
        if to_url == self.page.url {
            return None;
        }
        let task = self.state.task_id.clone()?;
        let from_url = std::mem::replace(&mut self.page.url, to_url.to_string());
        self.page.title = title.to_string();
        let after_click = self.state.filter.click_burst() > 0;
        self.state.filter.reset_click_burst();
        self.state.correlation = None;

        let event = EventRecord::new(EventType::Navigation, self.clock.now_millis(), to_url)
            .with_navigation(NavigationDetails {
                from_url: from_url.clone(),
                to_url: to_url.to_string(),
                title: title.to_string(),
                referrer: self.page.referrer.clone(),
                after_click,
                cross_document: false,
            });
        events::emit_navigation(&self.metrics, &task, &from_url, to_url, after_click);
        Some(self.record(event).await)
    }

    /// Structural insertions reported by the mutation watch.
    pub async fn on_nodes_inserted(
        &mut self,
        doc: &DomDocument,
        nodes: &[NodeId],
    ) -> Vec<EventRecord> {
        if !self.is_recording() || !self.state.observing {
            return Vec::new();
        }
        let now = self.clock.now_millis();
        let mut added = Vec::new();
        for &node in nodes {
            if !doc.is_element(node) || !doc.is_connected(node) {
                continue;
            }
            let occ = Occurrence::on(EventType::ElementAdded, node, now);
            added.extend(self.process(doc, occ).await);
        }
        self.metrics.record_element_added(added.len());
        added
    }

    /// Page teardown. Persists the buffer and the pending-navigation marker,
    /// then releases listeners. The task stays recording so the session on
    /// the next page can resume it. Returns whether the marker was stored.
    pub async fn before_unload(&mut self, doc: &DomDocument) -> bool {
        if !self.is_recording() {
            return false;
        }
        self.flush_pending(doc).await;
        let Some(task) = self.state.task_id.clone() else {
            return false;
        };
        let pending = PendingNavigation {
            from_url: self.page.url.clone(),
            title: self.page.title.clone(),
            at: self.clock.now_millis(),
            after_click: self.state.filter.click_burst() > 0,
        };

        let flushed = self
            .bridge
            .flush_buffer(&task, self.state.buffer.clone())
            .await
            .is_delivered();
        let noted = self
            .bridge
            .note_pending_navigation(&task, pending.clone())
            .await
            .is_delivered();
        let persisted = if flushed && noted {
            true
        } else {
            self.persist_pending_directly(&task, pending).await
        };

        self.release_host().await;
        self.reset();
        persisted
    }

    /// `Recording -> Stopping -> Idle`, bounded by the stop budget. The
    /// graceful path gets the budget minus the forced-stop reserve.
    pub async fn stop(&mut self, doc: &DomDocument) -> SessionResponse {
        if self.state.phase == SessionPhase::Idle {
            return SessionResponse::Stopped;
        }
        let Some(task) = self.state.task_id.clone() else {
            self.reset();
            return SessionResponse::Stopped;
        };
        self.state.phase = SessionPhase::Stopping;
        let buffered = self.state.buffer.len();

        let graceful = self.policy.stop.graceful();
        let response = match time::timeout(graceful, self.graceful_stop(doc, &task)).await {
            Ok(Ok(())) => SessionResponse::Stopped,
            Ok(Err(err)) => {
                warn!(
                    target: "capture.events",
                    task = %task,
                    error = %err,
                    "graceful stop failed, forcing"
                );
                self.force_stop().await;
                SessionResponse::ForceStoppedDueToError
            }
            Err(_) => {
                warn!(
                    target: "capture.events",
                    task = %task,
                    budget_ms = graceful.as_millis() as u64,
                    "graceful stop timed out, forcing"
                );
                self.force_stop().await;
                SessionResponse::ForceStoppedDueToTimeout
            }
        };
        events::emit_stopped(&task, &response, buffered, &self.metrics.snapshot());
        self.reset();
        response
    }

    /// Unconditional teardown. Ignores every host failure, persists the
    /// buffer best-effort and always ends `Idle`. Safe to call repeatedly.
    pub async fn force_stop(&mut self) -> bool {
        let live = self.state.phase != SessionPhase::Idle
            || self.state.listeners_attached
            || self.state.observing;
        if !live {
            return false;
        }
        self.metrics.record_forced_stop();
        let reserve = self.policy.stop.force_reserve();
        let step = reserve / 4;
        if time::timeout(step, self.host.detach_listeners()).await.is_err() {
            debug!(target: "capture.events", "forced detach timed out");
        }
        if time::timeout(step, self.host.disconnect_mutations())
            .await
            .is_err()
        {
            debug!(target: "capture.events", "forced disconnect timed out");
        }
        self.state.listeners_attached = false;
        self.state.observing = false;

        let persisted = match self.state.task_id.clone() {
            Some(task) => {
                let budget = reserve.saturating_sub(step * 2);
                let events = std::mem::take(&mut self.state.buffer);
                let at = self.clock.now_millis();
                time::timeout(budget, self.persist_forced(&task, events, at))
                    .await
                    .unwrap_or(false)
            }
            None => false,
        };
        self.reset();
        persisted
    }

    async fn graceful_stop(&mut self, doc: &DomDocument, task: &TaskId) -> Result<(), CaptureError> {
        self.flush_pending(doc).await;
        self.host.detach_listeners().await?;
        self.state.listeners_attached = false;
        if self.state.observing {
            self.host.disconnect_mutations().await?;
            self.state.observing = false;
        }
        let flushed = self
            .bridge
            .flush_buffer(task, self.state.buffer.clone())
            .await;
        if !flushed.is_delivered() {
            return Err(delivery_error("flush", &flushed));
        }
        let completed = self
            .bridge
            .complete_task(task, self.clock.now_millis())
            .await;
        if !completed.is_delivered() {
            return Err(delivery_error("complete", &completed));
        }
        Ok(())
    }

    async fn persist_forced(&self, task: &TaskId, events: Vec<EventRecord>, at: EpochMillis) -> bool {
        if let Some(store) = &self.store {
            let start_url = self.page.url.clone();
            let start_time = events.first().map_or(at, |event| event.timestamp);
            let result = update_task(
                store.as_ref(),
                task,
                self.bridge.policy().update_retries,
                |current| {
                    let mut record = current.unwrap_or_else(|| {
                        TaskRecord::new(task.clone(), start_url.clone(), start_time)
                    });
                    record.merge_events(&events);
                    record.complete(at);
                    Some(record)
                },
            )
            .await;
            match result {
                Ok(_) => return true,
                Err(err) => warn!(
                    target: "capture.events",
                    task = %task,
                    error = %err,
                    "forced persist to store failed"
                ),
            }
        }
        self.bridge.flush_buffer(task, events).await.is_delivered()
            && self.bridge.complete_task(task, at).await.is_delivered()
    }

    async fn persist_pending_directly(&self, task: &TaskId, pending: PendingNavigation) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let events = &self.state.buffer;
        let result = update_task(
            store.as_ref(),
            task,
            self.bridge.policy().update_retries,
            |current| {
                let mut record = current?;
                record.merge_events(events);
                if record.is_recording() {
                    record.pending_navigation = Some(pending.clone());
                }
                Some(record)
            },
        )
        .await;
        match result {
            Ok(stored) => stored.is_some(),
            Err(err) => {
                warn!(
                    target: "capture.events",
                    task = %task,
                    error = %err,
                    "pending navigation not persisted"
                );
                false
            }
        }
    }

    async fn process(&mut self, doc: &DomDocument, occ: Occurrence) -> Option<EventRecord> {
        if let Some(reason) = should_ignore(&mut self.state.filter, &self.policy.filter, doc, &occ)
        {
            events::emit_dropped(&self.metrics, occ.kind, reason);
            return None;
        }
        let ctx = NormalizeContext {
            url: &self.page.url,
            last_timestamp: self.state.last_timestamp(),
        };
        let mut event = match normalize(doc, &occ, ctx) {
            Ok(event) => event,
            Err(err) => {
                events::emit_discarded(&self.metrics, occ.kind, &err);
                return None;
            }
        };
        event.correlation_id = self.correlate(&occ);
        if self.wants_screenshot(&event) {
            event.screenshot = self
                .bridge
                .request_screenshot(self.page.clone(), self.policy.screenshot.timeout())
                .await;
            if event.screenshot.is_some() {
                self.metrics.record_screenshot();
            }
        }
        Some(self.record(event).await)
    }

    /// Appends to the buffer, then streams. The buffer write happens first
    /// so a send cut short by a stop still leaves the event persisted later.
    async fn record(&mut self, mut event: EventRecord) -> EventRecord {
        if event.event_id.is_empty() {
            event.event_id = Uuid::new_v4().to_string();
        }
        if let Some(last) = self.state.last_timestamp() {
            event.timestamp = event.timestamp.max(last);
        }
        self.state.buffer.push(event.clone());
        if let Some(task) = &self.state.task_id {
            events::emit_kept(&self.metrics, task, event.event_type, event.timestamp);
            if self.policy.stream_events {
                self.bridge.send_event(task, event.clone()).await;
            }
        }
        event
    }

    async fn flush_pending(&mut self, doc: &DomDocument) {
        if let Some(occ) = self.state.debouncer.flush_all() {
            self.process(doc, occ).await;
        }
    }

    fn correlate(&mut self, occ: &Occurrence) -> Option<String> {
        let target = occ.target?;
        match occ.kind {
            EventType::MouseDown => {
                let id = Uuid::new_v4().to_string();
                self.state.correlation = Some((target, id.clone()));
                Some(id)
            }
            EventType::MouseUp | EventType::Click => match self.state.correlation.take() {
                Some((open, id)) if open == target => {
                    if occ.kind == EventType::MouseUp {
                        self.state.correlation = Some((open, id.clone()));
                    }
                    Some(id)
                }
                _ => None,
            },
            kind if kind.is_pointer() => {
                if self
                    .state
                    .correlation
                    .as_ref()
                    .is_some_and(|(open, _)| *open != target)
                {
                    self.state.correlation = None;
                }
                None
            }
            _ => None,
        }
    }

    fn wants_screenshot(&self, event: &EventRecord) -> bool {
        match self.policy.screenshot.mode {
            ScreenshotMode::Off => false,
            ScreenshotMode::ClickClass => event.event_type.is_click_class(),
            ScreenshotMode::Interactive => event
                .target
                .as_ref()
                .is_some_and(|target| target.is_interactive),
        }
    }

    async fn release_host(&mut self) {
        let step = self.policy.stop.force_reserve();
        if self.state.listeners_attached {
            match time::timeout(step, self.host.detach_listeners()).await {
                Ok(Err(err)) => debug!(target: "capture.events", error = %err, "detach failed"),
                Err(_) => debug!(target: "capture.events", "detach timed out"),
                Ok(Ok(())) => {}
            }
        }
        if self.state.observing {
            if let Err(err) = self.host.disconnect_mutations().await {
                debug!(target: "capture.events", error = %err, "disconnect failed");
            }
        }
        self.state.listeners_attached = false;
        self.state.observing = false;
    }

    fn reset(&mut self) {
        self.state = SessionState::idle(&self.policy);
    }
}

fn delivery_error(step: &str, delivery: &Delivery) -> CaptureError {
    let reason = match &delivery.status {
        DeliveryStatus::Undelivered { reason } | DeliveryStatus::Rejected { reason } => {
            reason.as_str()
        }
        DeliveryStatus::Delivered => "delivered",
    };
    CaptureError::Persistence(format!("{step}: {reason}"))
}
