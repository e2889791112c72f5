//! Persistence bridge
//!
//! Carries normalized events and task lifecycle updates from a capture
//! context to the task store. The capture side talks to a
//! [`PersistenceBridge`], which validates every payload, applies one
//! configurable timeout and never fails: each send resolves to a
//! [`Delivery`] whose status says what happened. Unacknowledged writes are
//! kept in a bounded [`BackupLog`].
//!
//! The store side is a [`BackgroundRelay`] that owns the [`TaskStore`] and
//! performs every read-modify-write with revision checks.
//!
//! [`TaskStore`]: soultrace_task_store::TaskStore

pub mod backup;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod errors;
pub mod message;
pub mod metrics;
pub mod relay;

pub use backup::{BackupEntry, BackupLog};
pub use bridge::{Delivery, DeliveryStatus, PersistenceBridge};
pub use channel::{relay_channel, Envelope, MessageChannel, RelayChannel};
pub use config::BridgePolicyView;
pub use errors::BridgeError;
pub use message::{BridgeMessage, BridgeReply};
pub use metrics::{BridgeMetricSnapshot, BridgeMetrics};
pub use relay::{BackgroundRelay, NoScreenshots, ScreenshotService};

use std::sync::Arc;

use soultrace_task_store::TaskStore;
use tokio::task::JoinHandle;

/// Wires a bridge to a freshly spawned relay over `store`.
pub fn connect(
    policy: BridgePolicyView,
    store: Arc<dyn TaskStore>,
    screenshots: Arc<dyn ScreenshotService>,
) -> (Arc<PersistenceBridge>, JoinHandle<()>) {
    let (channel, rx) = relay_channel(policy.relay_queue);
    let relay = BackgroundRelay::new(store, policy.update_retries).with_screenshots(screenshots);
    let handle = relay.spawn(rx);
    let bridge = PersistenceBridge::new(policy, Some(channel.into_shared()));
    (Arc::new(bridge), handle)
}
