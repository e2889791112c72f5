//! Event capture pipeline
//!
//! Turns raw platform occurrences into the recorded event log of a task:
//!
//! occurrence -> [`DispatchDebouncer`] -> [`should_ignore`] -> [`normalize`]
//! -> session buffer -> [`PersistenceBridge`]
//!
//! The [`RecordingSession`] drives the `Idle -> Recording -> Stopping`
//! lifecycle, navigation continuity and the mutation watch. Platform
//! bindings sit behind [`CaptureHost`].
//!
//! [`PersistenceBridge`]: persistence_bridge::PersistenceBridge

pub mod debounce;
pub mod errors;
pub mod events;
pub mod filter;
pub mod injection;
pub mod metrics;
pub mod model;
pub mod normalizer;
pub mod policy;
pub mod ports;
pub mod session;

pub use debounce::DispatchDebouncer;
pub use errors::CaptureError;
pub use filter::{should_ignore, DropReason, FilterState};
pub use injection::{InjectionGuard, InjectionRegistry};
pub use metrics::{CaptureMetricSnapshot, CaptureMetrics};
pub use model::{Occurrence, SessionCommand, SessionPhase, SessionResponse};
pub use normalizer::{describe_target, normalize, NormalizeContext};
pub use policy::{
    CapturePolicyView, DispatchWindows, FilterThresholds, ScreenshotMode, ScreenshotPolicy,
    StopPolicy,
};
pub use ports::{CaptureHost, Clock, ManualClock, ScriptedHost, SystemClock};
pub use session::{RecordingSession, SessionBuilder, SessionState};
