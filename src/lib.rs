//! SoulTrace library
//!
//! Configuration and transcript replay shared by the `soultrace` binary and
//! its integration tests.

pub mod config;
pub mod transcript;

pub use config::Config;
pub use transcript::{parse_transcript, StepOutcome, TranscriptError, TranscriptRunner, TranscriptStep};
