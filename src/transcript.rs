//! Host transcripts.
//!
//! A transcript is a JSON-lines recording of what a browser host would feed
//! a capture context: page loads, lifecycle commands, raw occurrences,
//! insertions and navigations. [`TranscriptRunner`] replays it through a
//! live [`RecordingSession`] wired to a background relay, so a recording can
//! be reproduced without a browser.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use event_capture::{
    CapturePolicyView, InjectionRegistry, ManualClock, Occurrence, RecordingSession,
    ScriptedHost, SessionCommand, SessionPhase, SessionResponse,
};
use persistence_bridge::{BridgePolicyView, NoScreenshots, PersistenceBridge};
use soultrace_core_types::{
    EpochMillis, EventType, KeyMod, KeyboardDetails, PageInfo, PointerDetails, ScrollDetails,
    TaskId,
};
use soultrace_dom_model::{DomDocument, DomError, NodeId, NodeSpec};
use soultrace_task_store::TaskStore;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("step `{0}` needs a page; add a `page` step first")]
    NoPage(&'static str),
    #[error("no element matches `{0}`")]
    UnknownTarget(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

/// One transcript line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TranscriptStep {
    /// A new document is loaded into a fresh capture context.
    Page {
        url: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        referrer: String,
        #[serde(default)]
        dom: Option<NodeSpec>,
        #[serde(default)]
        at: Option<EpochMillis>,
    },
    Start {
        task_id: TaskId,
        #[serde(default)]
        at: Option<EpochMillis>,
    },
    Event {
        at: EpochMillis,
        #[serde(rename = "type")]
        kind: EventType,
        #[serde(default)]
        target: Option<String>,
        #[serde(flatten)]
        detail: EventDetail,
    },
    Insert {
        at: EpochMillis,
        #[serde(default = "default_parent")]
        parent: String,
        node: NodeSpec,
    },
    Navigate {
        at: EpochMillis,
        url: String,
        #[serde(default)]
        title: String,
    },
    Unload {
        at: EpochMillis,
    },
    Tick {
        at: EpochMillis,
    },
    Stop {
        #[serde(default)]
        at: Option<EpochMillis>,
    },
}

fn default_parent() -> String {
    "body".to_string()
}

impl TranscriptStep {
    pub fn name(&self) -> &'static str {
        match self {
            TranscriptStep::Page { .. } => "page",
            TranscriptStep::Start { .. } => "start",
            TranscriptStep::Event { .. } => "event",
            TranscriptStep::Insert { .. } => "insert",
            TranscriptStep::Navigate { .. } => "navigate",
            TranscriptStep::Unload { .. } => "unload",
            TranscriptStep::Tick { .. } => "tick",
            TranscriptStep::Stop { .. } => "stop",
        }
    }

    fn at(&self) -> Option<EpochMillis> {
        match self {
            TranscriptStep::Page { at, .. }
            | TranscriptStep::Start { at, .. }
            | TranscriptStep::Stop { at } => *at,
            TranscriptStep::Event { at, .. }
            | TranscriptStep::Insert { at, .. }
            | TranscriptStep::Navigate { at, .. }
            | TranscriptStep::Unload { at }
            | TranscriptStep::Tick { at } => Some(*at),
        }
    }
}

/// Optional per-event fields, flattened into the event line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub client_x: Option<f64>,
    #[serde(default)]
    pub client_y: Option<f64>,
    #[serde(default)]
    pub button: Option<i16>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub delta_x: Option<f64>,
    #[serde(default)]
    pub delta_y: Option<f64>,
    #[serde(default)]
    pub modifiers: KeyMod,
}

/// Parses a JSON-lines transcript. Blank lines and `#` comments are skipped.
pub fn parse_transcript(raw: &str) -> Result<Vec<TranscriptStep>, TranscriptError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| TranscriptError::Parse {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// What one replayed step produced.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<SessionResponse>,
    pub recorded: usize,
}

/// Replays transcript steps against one task store.
pub struct TranscriptRunner {
    capture: CapturePolicyView,
    store: Arc<dyn TaskStore>,
    bridge: Arc<PersistenceBridge>,
    registry: InjectionRegistry,
    host: Arc<ScriptedHost>,
    clock: Arc<ManualClock>,
    doc: Option<DomDocument>,
    session: Option<RecordingSession>,
    /// Task to resume when the next page loads after an unload.
    resume: Option<TaskId>,
}

impl TranscriptRunner {
    pub fn new(config: &Config, store: Arc<dyn TaskStore>, bridge: Arc<PersistenceBridge>) -> Self {
        Self {
            capture: config.capture.clone(),
            store,
            bridge,
            registry: InjectionRegistry::new(),
            host: Arc::new(ScriptedHost::new()),
            clock: Arc::new(ManualClock::new(0)),
            doc: None,
            session: None,
            resume: None,
        }
    }

    /// Runner with its own relay over `store`.
    pub fn connect(config: &Config, store: Arc<dyn TaskStore>) -> Self {
        let bridge_policy: BridgePolicyView = config.bridge.clone();
        let (bridge, _relay) =
            persistence_bridge::connect(bridge_policy, store.clone(), Arc::new(NoScreenshots));
        Self::new(config, store, bridge)
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        self.store.clone()
    }

    pub fn bridge(&self) -> &PersistenceBridge {
        &self.bridge
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub async fn run_all(
        &mut self,
        steps: Vec<TranscriptStep>,
    ) -> Result<Vec<StepOutcome>, TranscriptError> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            outcomes.push(self.run(step).await?);
        }
        Ok(outcomes)
    }

    pub async fn run(&mut self, step: TranscriptStep) -> Result<StepOutcome, TranscriptError> {
        let name = step.name();
        if let Some(at) = step.at() {
            self.clock.set(at);
        }
        debug!(target: "soultrace::transcript", step = name, "replaying step");
        let mut outcome = StepOutcome {
            step: name,
            response: None,
            recorded: 0,
        };

        match step {
            TranscriptStep::Page {
                url,
                title,
                referrer,
                dom,
                ..
            } => {
                self.load_page(PageInfo::new(url, title).with_referrer(referrer), dom)?;
                if let Some(task_id) = self.resume.take() {
                    let (session, doc) = self.live("page")?;
                    let response = session.start(doc, task_id).await;
                    outcome.recorded = usize::from(response == SessionResponse::Started);
                    outcome.response = Some(response);
                }
            }
            TranscriptStep::Start { task_id, .. } => {
                let (session, doc) = self.live("start")?;
                let response = session
                    .handle_command(doc, SessionCommand::StartRecording { task_id })
                    .await;
                outcome.recorded = usize::from(response == SessionResponse::Started);
                outcome.response = Some(response);
            }
            TranscriptStep::Event {
                at,
                kind,
                target,
                detail,
            } => {
                let (session, doc) = self.live("event")?;
                let target = target
                    .as_deref()
                    .map(|selector| resolve(doc, selector))
                    .transpose()?;
                let occ = build_occurrence(kind, target, at, detail);
                outcome.recorded = session.dispatch(doc, occ).await.len();
            }
            TranscriptStep::Insert { parent, node, .. } => {
                let doc = self.doc.as_mut().ok_or(TranscriptError::NoPage("insert"))?;
                let parent = resolve(doc, &parent)?;
                let inserted = doc.insert_subtree(parent, &node)?;
                let (session, doc) = self.live("insert")?;
                outcome.recorded = session.on_nodes_inserted(doc, &inserted).await.len();
            }
            TranscriptStep::Navigate { url, title, .. } => {
                let (session, doc) = self.live("navigate")?;
                outcome.recorded = usize::from(session.navigate(doc, &url, &title).await.is_some());
            }
            TranscriptStep::Unload { .. } => {
                let (session, doc) = self.live("unload")?;
                let task = session.task_id().cloned();
                if session.before_unload(doc).await {
                    self.resume = task;
                }
                self.session = None;
            }
            TranscriptStep::Tick { .. } => {
                let (session, doc) = self.live("tick")?;
                outcome.recorded = usize::from(session.tick(doc).await.is_some());
            }
            TranscriptStep::Stop { .. } => {
                let (session, doc) = self.live("stop")?;
                outcome.response = Some(
                    session
                        .handle_command(doc, SessionCommand::StopRecording)
                        .await,
                );
            }
        }
        Ok(outcome)
    }

    /// Stops a session the transcript left recording.
    pub async fn finish(&mut self) -> Option<SessionResponse> {
        let (session, doc) = self.live("stop").ok()?;
        if session.phase() == SessionPhase::Idle {
            return None;
        }
        Some(session.stop(doc).await)
    }

    fn load_page(&mut self, page: PageInfo, dom: Option<NodeSpec>) -> Result<(), TranscriptError> {
        let doc = match dom {
            Some(spec) if spec.tag.as_deref() == Some("html") => DomDocument::from_spec(&spec)?,
            Some(spec) => {
                let mut doc = DomDocument::with_body();
                if let Some(body) = doc.body() {
                    doc.insert_subtree(body, &spec)?;
                }
                doc
            }
            None => DomDocument::with_body(),
        };
        // The previous context is gone with its page.
        self.session = None;
        let session = RecordingSession::builder(self.host.clone(), self.bridge.clone())
            .policy(self.capture.clone())
            .store(self.store.clone())
            .clock(self.clock.clone())
            .page(page.clone())
            .inject(&self.registry);
        info!(
            target: "soultrace::transcript",
            url = %page.url,
            injected = session.is_some(),
            "page loaded"
        );
        self.session = session;
        self.doc = Some(doc);
        Ok(())
    }

    fn live(
        &mut self,
        step: &'static str,
    ) -> Result<(&mut RecordingSession, &DomDocument), TranscriptError> {
        match (self.session.as_mut(), self.doc.as_ref()) {
            (Some(session), Some(doc)) => Ok((session, doc)),
            _ => Err(TranscriptError::NoPage(step)),
        }
    }
}

fn resolve(doc: &DomDocument, selector: &str) -> Result<NodeId, TranscriptError> {
    doc.select(selector)?
        .ok_or_else(|| TranscriptError::UnknownTarget(selector.to_string()))
}

fn build_occurrence(
    kind: EventType,
    target: Option<NodeId>,
    at: EpochMillis,
    detail: EventDetail,
) -> Occurrence {
    let mut occ = Occurrence::new(kind, target, at);
    occ.value = detail.value;
    if kind.is_pointer() {
        occ.pointer = Some(PointerDetails {
            client_x: detail.client_x,
            client_y: detail.client_y,
            button: detail.button,
            modifiers: detail.modifiers,
            ..Default::default()
        });
    }
    if kind.is_keyboard() {
        occ.keyboard = Some(KeyboardDetails {
            key: detail.key.unwrap_or_default(),
            code: detail.code.unwrap_or_default(),
            repeat: false,
            modifiers: detail.modifiers,
        });
    }
    if kind == EventType::Scroll {
        occ.scroll = Some(ScrollDetails {
            delta_x: detail.delta_x.unwrap_or(0.0),
            delta_y: detail.delta_y.unwrap_or(0.0),
            scroll_x: None,
            scroll_y: None,
        });
    }
    occ
}
