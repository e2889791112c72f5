use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use soultrace_core_types::{now_millis, EpochMillis};

use crate::errors::CaptureError;

/// Platform binding a session drives: listener attachment and the
/// structural mutation watch.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    async fn attach_listeners(&self) -> Result<(), CaptureError>;
    async fn detach_listeners(&self) -> Result<(), CaptureError>;
    async fn observe_mutations(&self) -> Result<(), CaptureError>;
    async fn disconnect_mutations(&self) -> Result<(), CaptureError>;
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> EpochMillis;
}

#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        now_millis()
    }
}

/// Clock advanced explicitly; used by transcripts and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, at: EpochMillis) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }

    pub fn advance(&self, by: EpochMillis) {
        self.now.fetch_add(by.max(0), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}

/// In-process host that tracks listener state and can inject failures.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    attached: AtomicBool,
    observing: AtomicBool,
    attach_calls: AtomicU32,
    fail_attach: AtomicBool,
    fail_detach: AtomicBool,
    detach_delay_ms: AtomicI64,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn fail_detach(&self, fail: bool) {
        self.fail_detach.store(fail, Ordering::SeqCst);
    }

    /// Makes every detach take `delay` before answering.
    pub fn stall_detach(&self, delay: Duration) {
        self.detach_delay_ms
            .store(delay.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn is_observing(&self) -> bool {
        self.observing.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> u32 {
        self.attach_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureHost for ScriptedHost {
    async fn attach_listeners(&self) -> Result<(), CaptureError> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(CaptureError::AttachFailed("host refused listeners".into()));
        }
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn detach_listeners(&self) -> Result<(), CaptureError> {
        let delay = self.detach_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_detach.load(Ordering::SeqCst) {
            return Err(CaptureError::DetachFailed("host lost its listeners".into()));
        }
        self.attached.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn observe_mutations(&self) -> Result<(), CaptureError> {
        self.observing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect_mutations(&self) -> Result<(), CaptureError> {
        self.observing.store(false, Ordering::SeqCst);
        Ok(())
    }
}
