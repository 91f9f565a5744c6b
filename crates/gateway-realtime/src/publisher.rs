//! Per-client outbound buffer.
//!
//! Publishing never blocks: when the buffer is full the message is dropped
//! and counted. A forwarding task drains the buffer into the writer's egress
//! channel in FIFO order, so a slow peer fills its own buffer and nobody
//! else's.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use gateway_core::types::SessionId;

use crate::client::closing;
use crate::message::OutboundMessage;

/// Items consumed by a client's writer task.
#[derive(Debug)]
pub(crate) enum Egress {
    /// Application message, encoded by the writer.
    Message(OutboundMessage),
    /// Raw control frame such as a pong.
    Frame(crate::message::Frame),
}

/// Bounded, lossy publisher owned by one client.
#[derive(Debug)]
pub struct Publisher {
    session_id: SessionId,
    tx: mpsc::Sender<OutboundMessage>,
    dropped: AtomicU64,
    overflowing: AtomicBool,
}

impl Publisher {
    /// Create a publisher and spawn its forwarding task.
    ///
    /// The task ends when `shutdown` flips, the egress receiver is dropped or
    /// the publisher itself is dropped.
    pub(crate) fn spawn(
        session_id: SessionId,
        capacity: usize,
        egress: mpsc::Sender<Egress>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(forward(session_id, rx, egress, shutdown));
        let publisher = Self {
            session_id,
            tx,
            dropped: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
        };
        (publisher, task)
    }

    /// Queue a message for delivery. Returns `false` if it was dropped.
    pub fn publish(&self, mut message: OutboundMessage) -> bool {
        message.session_id.get_or_insert(self.session_id);
        match self.tx.try_send(message) {
            Ok(()) => {
                self.overflowing.store(false, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.overflowing.swap(true, Ordering::Relaxed) {
                    warn!(
                        session_id = %self.session_id,
                        message_type = %dropped.kind,
                        "Publisher buffer full, dropping messages"
                    );
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(session_id = %self.session_id, "Publisher closed, message discarded");
                false
            }
        }
    }

    /// Messages buffered and not yet forwarded to the writer.
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Messages dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn forward(
    session_id: SessionId,
    mut rx: mpsc::Receiver<OutboundMessage>,
    egress: mpsc::Sender<Egress>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            () = closing(&mut shutdown) => break,
            next = rx.recv() => {
                let Some(message) = next else { break };
                if egress.send(Egress::Message(message)).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(%session_id, "Publisher forwarding stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(n: u64) -> OutboundMessage {
        OutboundMessage::new("tick", json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_publish_beyond_capacity_drops() {
        // Nothing drains egress, and the forwarder has not run yet.
        let (egress_tx, _egress_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (publisher, _task) = Publisher::spawn(SessionId::new(), 4, egress_tx, shutdown_rx);

        let accepted = (0..100).filter(|n| publisher.publish(message(*n))).count();

        assert_eq!(accepted, 4);
        assert_eq!(publisher.pending(), 4);
        assert_eq!(publisher.dropped(), 96);
        assert!(publisher.pending() <= publisher.capacity());
    }

    #[tokio::test]
    async fn test_forwarding_preserves_order_and_stamps_session() {
        let session_id = SessionId::new();
        let (egress_tx, mut egress_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (publisher, _task) = Publisher::spawn(session_id, 8, egress_tx, shutdown_rx);

        for n in 1..=3 {
            assert!(publisher.publish(message(n)));
        }

        for n in 1..=3 {
            let Some(Egress::Message(received)) = egress_rx.recv().await else {
                panic!("expected a message");
            };
            assert_eq!(received.payload, json!({ "n": n }));
            assert_eq!(received.session_id, Some(session_id));
        }
    }

    #[tokio::test]
    async fn test_forwarder_stops_on_shutdown() {
        let (egress_tx, _egress_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_publisher, task) = Publisher::spawn(SessionId::new(), 4, egress_tx, shutdown_rx);

        shutdown_tx.send_replace(true);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
