use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::errors::BridgeError;
use crate::message::{BridgeMessage, BridgeReply};

/// One request travelling to the relay, with the slot for its answer.
#[derive(Debug)]
pub struct Envelope {
    pub message: BridgeMessage,
    pub reply: oneshot::Sender<BridgeReply>,
}

/// Transport between a capture context and the store owner.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn request(&self, message: BridgeMessage) -> Result<BridgeReply, BridgeError>;

    fn is_open(&self) -> bool;
}

/// In-process channel to a [`crate::BackgroundRelay`].
#[derive(Clone, Debug)]
pub struct RelayChannel {
    tx: mpsc::Sender<Envelope>,
}

pub fn relay_channel(capacity: usize) -> (RelayChannel, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RelayChannel { tx }, rx)
}

impl RelayChannel {
    pub fn into_shared(self) -> Arc<dyn MessageChannel> {
        Arc::new(self)
    }
}

#[async_trait]
impl MessageChannel for RelayChannel {
    async fn request(&self, message: BridgeMessage) -> Result<BridgeReply, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        rx.await.map_err(|_| BridgeError::ChannelClosed)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soultrace_core_types::TaskId;

    #[tokio::test]
    async fn dropped_receiver_closes_channel() {
        let (channel, rx) = relay_channel(4);
        drop(rx);
        assert!(!channel.is_open());
        let err = channel
            .request(BridgeMessage::TabRemoved {
                task_id: TaskId::from("T1"),
                at: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ChannelClosed));
    }

    #[tokio::test]
    async fn unanswered_request_reports_closed() {
        let (channel, mut rx) = relay_channel(4);
        let pending = tokio::spawn(async move {
            channel
                .request(BridgeMessage::TabRemoved {
                    task_id: TaskId::from("T1"),
                    at: 0,
                })
                .await
        });
        let envelope = rx.recv().await.unwrap();
        drop(envelope);
        assert!(matches!(
            pending.await.unwrap(),
            Err(BridgeError::ChannelClosed)
        ));
    }
}
