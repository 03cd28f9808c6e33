//! Thread boundary between graph callbacks and the host thread.
//!
//! Callbacks run on the scheduler thread. They hold a [`HostSender`] and
//! push [`HostMessage`]s; the host drains them from the [`HostBridge`] on
//! its own thread. Sends never block: when the channel is full the message
//! is dropped and counted.

use crate::formats::Detection;
use crate::packet::Timestamp;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default channel capacity for messages (callbacks → host).
pub const DEFAULT_HOST_CHANNEL_CAPACITY: usize = 1024;

/// Messages sent from graph callbacks to the host thread.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Float values decoded from one packet.
    Values {
        stream: String,
        timestamp: Timestamp,
        values: Vec<f32>,
    },

    /// A string packet.
    Text {
        stream: String,
        timestamp: Timestamp,
        text: String,
    },

    /// Detections decoded from one packet; empty when nothing was detected.
    Detections {
        stream: String,
        timestamp: Timestamp,
        detections: Vec<Detection>,
    },
}

impl HostMessage {
    pub fn stream(&self) -> &str {
        match self {
            HostMessage::Values { stream, .. }
            | HostMessage::Text { stream, .. }
            | HostMessage::Detections { stream, .. } => stream,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            HostMessage::Values { timestamp, .. }
            | HostMessage::Text { timestamp, .. }
            | HostMessage::Detections { timestamp, .. } => *timestamp,
        }
    }
}

/// Callback-side handle. Cheap to clone; one per callback.
#[derive(Debug, Clone)]
pub struct HostSender {
    tx: Sender<HostMessage>,
    dropped: Arc<AtomicU64>,
}

impl HostSender {
    /// Queue `message` for the host. Returns `false` when it was dropped.
    pub fn send(&self, message: HostMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "Host channel full, dropped message from '{}' ({} dropped so far)",
                    message.stream(),
                    dropped
                );
                false
            }
            Err(TrySendError::Disconnected(message)) => {
                tracing::debug!(
                    "Host bridge closed, message from '{}' discarded",
                    message.stream()
                );
                false
            }
        }
    }
}

/// Host-side end of the bridge.
pub struct HostBridge {
    tx: Sender<HostMessage>,
    msg_rx: Receiver<HostMessage>,
    dropped: Arc<AtomicU64>,
}

impl HostBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, msg_rx) = bounded(capacity.max(1));
        Self {
            tx,
            msg_rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn sender(&self) -> HostSender {
        HostSender {
            tx: self.tx.clone(),
            dropped: self.dropped.clone(),
        }
    }

    /// Drain all pending messages.
    pub fn drain(&self) -> Vec<HostMessage> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Try to receive a single message without blocking.
    pub fn try_recv(&self) -> Option<HostMessage> {
        self.msg_rx.try_recv().ok()
    }

    /// Wait at most `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HostMessage> {
        self.msg_rx.recv_timeout(timeout).ok()
    }

    pub fn pending(&self) -> usize {
        self.msg_rx.len()
    }

    /// Messages dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_CHANNEL_CAPACITY)
    }
}
