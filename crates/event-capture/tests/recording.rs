use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use event_capture::{
    CapturePolicyView, InjectionRegistry, ManualClock, Occurrence, RecordingSession,
    ScreenshotMode, ScriptedHost, SessionCommand, SessionPhase, SessionResponse,
};
use persistence_bridge::{
    connect, BridgeError, BridgePolicyView, NoScreenshots, PersistenceBridge, ScreenshotService,
};
use soultrace_core_types::{ContextId, EventRecord, EventType, PageInfo, TaskId};
use soultrace_dom_model::{DomDocument, NodeId, NodeSpec};
use soultrace_task_store::{InMemoryTaskStore, TaskRecord, TaskStatus, TaskStore};

struct Harness {
    store: Arc<InMemoryTaskStore>,
    bridge: Arc<PersistenceBridge>,
    host: Arc<ScriptedHost>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_screenshots(Arc::new(NoScreenshots))
    }

    fn with_screenshots(screenshots: Arc<dyn ScreenshotService>) -> Self {
        let store = InMemoryTaskStore::new();
        let (bridge, _relay) = connect(BridgePolicyView::default(), store.clone(), screenshots);
        Self {
            store,
            bridge,
            host: Arc::new(ScriptedHost::new()),
            clock: Arc::new(ManualClock::new(1_000)),
        }
    }

    fn session(&self, url: &str, policy: CapturePolicyView) -> RecordingSession {
        RecordingSession::builder(self.host.clone(), self.bridge.clone())
            .policy(policy)
            .clock(self.clock.clone())
            .store(self.store.clone())
            .page(PageInfo::new(url, "Page"))
            .build()
    }

    async fn stored(&self, id: &str) -> TaskRecord {
        self.store
            .get(&TaskId::from(id))
            .await
            .unwrap()
            .expect("task stored")
    }
}

struct Page {
    doc: DomDocument,
    submit: NodeId,
    card: NodeId,
    search: NodeId,
}

fn page() -> Page {
    let mut doc = DomDocument::with_body();
    let body = doc.body().unwrap();
    let ids = doc
        .insert_subtree(
            body,
            &NodeSpec::element("form")
                .child(NodeSpec::element("input").attr("name", "search"))
                .child(NodeSpec::element("div").attr("class", "card").with_text("Result"))
                .child(
                    NodeSpec::element("button")
                        .attr("id", "submit")
                        .with_text("Submit"),
                ),
        )
        .unwrap();
    Page {
        doc,
        search: ids[1],
        card: ids[2],
        submit: ids[3],
    }
}

fn of_type(events: &[EventRecord], kind: EventType) -> Vec<&EventRecord> {
    events.iter().filter(|e| e.event_type == kind).collect()
}

#[tokio::test]
async fn click_on_submit_button_is_recorded_with_stable_id() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());

    let started = session
        .handle_command(
            &p.doc,
            SessionCommand::StartRecording {
                task_id: TaskId::from("T1"),
            },
        )
        .await;
    assert_eq!(started, SessionResponse::Started);
    session
        .dispatch(&p.doc, Occurrence::click(p.submit, 1_010))
        .await;
    let stopped = session
        .handle_command(&p.doc, SessionCommand::StopRecording)
        .await;
    assert_eq!(stopped, SessionResponse::Stopped);

    let record = h.stored("T1").await;
    assert_eq!(record.status, TaskStatus::Completed);
    let clicks = of_type(&record.events, EventType::Click);
    assert_eq!(clicks.len(), 1);
    let target = clicks[0].target.as_ref().unwrap();
    assert_eq!(target.bid, "id-submit");
    assert!(target.is_interactive);
    assert_eq!(record.events[0].event_type, EventType::PageLoad);
}

#[tokio::test]
async fn small_scroll_burst_keeps_nothing() {
    let h = Harness::new();
    let p = page();
    let body = p.doc.body().unwrap();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    for n in 0..10 {
        let at = 1_000 + n * 50;
        h.clock.set(at);
        session
            .dispatch(&p.doc, Occurrence::scroll(body, 0.0, 5.0, at))
            .await;
        session.tick(&p.doc).await;
    }
    session.stop(&p.doc).await;

    let record = h.stored("T1").await;
    assert!(of_type(&record.events, EventType::Scroll).is_empty());
    assert!(session.metrics().snapshot().small_scroll >= 1);
}

#[tokio::test]
async fn history_navigation_records_one_event_before_new_page_events() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    session
        .dispatch(&p.doc, Occurrence::click(p.submit, 1_010))
        .await;
    h.clock.set(1_020);
    let nav = session
        .navigate(&p.doc, "https://a/b", "B")
        .await
        .expect("url changed");
    assert!(session.navigate(&p.doc, "https://a/b", "B").await.is_none());
    session
        .dispatch(&p.doc, Occurrence::click(p.card, 1_030))
        .await;

    let details = nav.navigation.as_ref().unwrap();
    assert_eq!(details.from_url, "https://a/");
    assert_eq!(details.to_url, "https://a/b");
    assert!(details.after_click);
    assert!(!details.cross_document);

    let buffer = session.buffer();
    let navs: Vec<_> = buffer
        .iter()
        .enumerate()
        .filter(|(_, e)| e.event_type == EventType::Navigation)
        .collect();
    assert_eq!(navs.len(), 1);
    let nav_at = navs[0].0;
    assert!(buffer[nav_at + 1..].iter().all(|e| e.url == "https://a/b"));
}

#[tokio::test]
async fn full_page_navigation_resumes_task_on_next_page() {
    let h = Harness::new();
    let p = page();
    let mut first = h.session("https://a/", CapturePolicyView::default());
    first.start(&p.doc, TaskId::from("T1")).await;
    first.dispatch(&p.doc, Occurrence::click(p.submit, 1_010)).await;
    h.clock.set(1_100);
    assert!(first.before_unload(&p.doc).await);
    assert_eq!(first.phase(), SessionPhase::Idle);
    assert_eq!(h.stored("T1").await.status, TaskStatus::Recording);

    h.clock.set(1_500);
    let mut second = h.session("https://a/b", CapturePolicyView::default());
    second.start(&p.doc, TaskId::from("T1")).await;
    second.stop(&p.doc).await;

    let record = h.stored("T1").await;
    let kinds: Vec<_> = record.events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        [
            EventType::PageLoad,
            EventType::Click,
            EventType::Navigation,
            EventType::PageLoad
        ]
    );
    let nav = record.events[2].navigation.as_ref().unwrap();
    assert_eq!(nav.from_url, "https://a/");
    assert_eq!(nav.to_url, "https://a/b");
    assert!(nav.after_click);
    assert!(nav.cross_document);
    assert!(record.pending_navigation.is_none());
}

#[tokio::test]
async fn stop_with_torn_channel_forces_and_persists_buffer() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;
    session.dispatch(&p.doc, Occurrence::click(p.submit, 1_010)).await;

    h.bridge.detach_channel();
    session.dispatch(&p.doc, Occurrence::click(p.card, 1_020)).await;

    let started = tokio::time::Instant::now();
    let response = session.stop(&p.doc).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response, SessionResponse::ForceStoppedDueToError);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(!h.host.is_attached());

    let record = h.stored("T1").await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(of_type(&record.events, EventType::Click).len(), 2);
    assert!(!h.bridge.backup().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stalled_detach_times_out_into_forced_stop() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;
    session.dispatch(&p.doc, Occurrence::click(p.submit, 1_010)).await;
    h.host.stall_detach(Duration::from_secs(10));

    let started = tokio::time::Instant::now();
    let response = session.stop(&p.doc).await;
    let waited = started.elapsed();
    assert_eq!(response, SessionResponse::ForceStoppedDueToTimeout);
    assert!(waited >= Duration::from_millis(1_500));
    assert!(waited <= Duration::from_secs(2));
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(session.metrics().snapshot().forced_stops, 1);

    let record = h.stored("T1").await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(of_type(&record.events, EventType::Click).len(), 1);
}

#[tokio::test]
async fn stop_while_idle_is_a_no_op() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    assert_eq!(session.stop(&p.doc).await, SessionResponse::Stopped);
    assert_eq!(session.stop(&p.doc).await, SessionResponse::Stopped);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert!(h.store.is_empty());
    assert_eq!(h.host.attach_calls(), 0);
}

#[tokio::test]
async fn recorded_timestamps_never_decrease() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    h.clock.set(1_050);
    session
        .dispatch(&p.doc, Occurrence::input(p.search, "shoes", 1_050))
        .await;
    session.dispatch(&p.doc, Occurrence::click(p.submit, 1_400)).await;
    // Out-of-order platform stamp.
    session.dispatch(&p.doc, Occurrence::click(p.card, 1_200)).await;
    h.clock.set(1_900);
    session.navigate(&p.doc, "https://a/results", "Results").await;

    let stamps: Vec<_> = session.buffer().iter().map(|e| e.timestamp).collect();
    assert!(stamps.len() >= 4);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{stamps:?}");
}

#[tokio::test]
async fn duplicate_clicks_collapse_only_on_plain_targets() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    assert!(session.submit(&p.doc, Occurrence::click(p.card, 2_000)).await.is_some());
    assert!(session.submit(&p.doc, Occurrence::click(p.card, 2_010)).await.is_none());
    assert!(session.submit(&p.doc, Occurrence::click(p.submit, 3_000)).await.is_some());
    assert!(session.submit(&p.doc, Occurrence::click(p.submit, 3_010)).await.is_some());

    let clicks = of_type(session.buffer(), EventType::Click);
    assert_eq!(clicks.len(), 3);
    assert_eq!(session.metrics().snapshot().duplicate_click, 1);
}

#[tokio::test]
async fn unchanged_input_never_reaches_the_buffer() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    assert!(session
        .submit(&p.doc, Occurrence::input(p.search, "shoes", 2_000))
        .await
        .is_some());
    assert!(session
        .submit(&p.doc, Occurrence::input(p.search, "shoes", 3_000))
        .await
        .is_none());
    assert_eq!(of_type(session.buffer(), EventType::Input).len(), 1);
}

#[tokio::test]
async fn reinjection_into_live_context_is_refused() {
    let h = Harness::new();
    let registry = InjectionRegistry::new();
    let context = ContextId::new();
    let build = || {
        RecordingSession::builder(h.host.clone(), h.bridge.clone())
            .context(context.clone())
            .page(PageInfo::new("https://a/", "A"))
    };

    let live = build().inject(&registry).expect("first injection");
    assert!(build().inject(&registry).is_none());
    drop(live);
    assert!(build().inject(&registry).is_some());
}

struct FixedScreenshot;

#[async_trait]
impl ScreenshotService for FixedScreenshot {
    async fn capture(&self, _page: &PageInfo) -> Result<Option<String>, BridgeError> {
        Ok(Some("data:image/png;base64,AAAA".into()))
    }
}

#[tokio::test]
async fn click_class_screenshots_are_attached() {
    let h = Harness::with_screenshots(Arc::new(FixedScreenshot));
    let p = page();
    let mut policy = CapturePolicyView::default();
    policy.screenshot.mode = ScreenshotMode::ClickClass;
    let mut session = h.session("https://a/", policy);
    session.start(&p.doc, TaskId::from("T1")).await;

    let click = session
        .submit(&p.doc, Occurrence::click(p.submit, 1_010))
        .await
        .unwrap();
    assert_eq!(click.screenshot.as_deref(), Some("data:image/png;base64,AAAA"));
    let input = session
        .submit(&p.doc, Occurrence::input(p.search, "x", 1_500))
        .await
        .unwrap();
    assert!(input.screenshot.is_none());
    assert_eq!(session.metrics().snapshot().screenshots, 1);
}

#[tokio::test]
async fn same_millisecond_clicks_on_a_button_are_both_persisted() {
    let h = Harness::new();
    let p = page();
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    h.clock.set(2_000);
    let first = session.submit(&p.doc, Occurrence::click(p.submit, 2_000)).await.unwrap();
    let second = session.submit(&p.doc, Occurrence::click(p.submit, 2_000)).await.unwrap();
    assert_ne!(first.event_id, second.event_id);
    assert_eq!(of_type(session.buffer(), EventType::Click).len(), 2);

    assert_eq!(session.stop(&p.doc).await, SessionResponse::Stopped);
    let record = h.stored("T1").await;
    assert_eq!(of_type(&record.events, EventType::Click).len(), 2);
}

#[tokio::test]
async fn clicks_on_detached_elements_are_discarded() {
    let h = Harness::new();
    let mut p = page();
    p.doc.detach(p.card);
    let mut session = h.session("https://a/", CapturePolicyView::default());
    session.start(&p.doc, TaskId::from("T1")).await;

    assert!(session.submit(&p.doc, Occurrence::click(p.card, 1_010)).await.is_none());
    assert!(of_type(session.buffer(), EventType::Click).is_empty());
    assert_eq!(session.metrics().snapshot().discarded, 1);
}

struct SlowScreenshot;

#[async_trait]
impl ScreenshotService for SlowScreenshot {
    async fn capture(&self, _page: &PageInfo) -> Result<Option<String>, BridgeError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Some("data:image/png;base64,late".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn screenshot_timeout_still_records_the_click() {
    let h = Harness::with_screenshots(Arc::new(SlowScreenshot));
    let p = page();
    let mut policy = CapturePolicyView::default();
    policy.screenshot.mode = ScreenshotMode::ClickClass;
    policy.screenshot.timeout_ms = 200;
    let mut session = h.session("https://a/", policy);
    session.start(&p.doc, TaskId::from("T1")).await;

    let started = tokio::time::Instant::now();
    let click = session
        .submit(&p.doc, Occurrence::click(p.submit, 1_010))
        .await
        .expect("click kept");
    assert!(click.screenshot.is_none());
    assert!(started.elapsed() < Duration::from_secs(30));

    let buffered = of_type(session.buffer(), EventType::Click);
    assert_eq!(buffered.len(), 1);
    assert!(buffered[0].screenshot.is_none());
    assert_eq!(session.metrics().snapshot().screenshots, 0);
}
