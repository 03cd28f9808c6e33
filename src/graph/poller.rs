//! Pull-style access to an output stream.

use crate::packet::Packet;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Receives every packet of one stream in timestamp order.
///
/// Created with
/// [`PacketGraph::add_output_stream_poller`](super::PacketGraph::add_output_stream_poller)
/// before the run starts. Iteration blocks until the next packet arrives and
/// ends once the graph is done with the stream.
#[derive(Debug)]
pub struct OutputStreamPoller {
    stream: String,
    rx: Receiver<Packet>,
}

impl OutputStreamPoller {
    pub(crate) fn new(stream: impl Into<String>, rx: Receiver<Packet>) -> Self {
        Self {
            stream: stream.into(),
            rx,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Next packet without blocking. `None` when nothing is queued or the
    /// stream has ended.
    pub fn try_next(&self) -> Option<Packet> {
        match self.rx.try_recv() {
            Ok(packet) => Some(packet),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Next packet, waiting at most `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Packet> {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => Some(packet),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of packets queued and not yet taken.
    pub fn queue_size(&self) -> usize {
        self.rx.len()
    }
}

impl Iterator for OutputStreamPoller {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Payload, Timestamp};
    use crossbeam_channel::unbounded;

    #[test]
    fn test_iterates_until_sender_dropped() {
        let (tx, rx) = unbounded();
        let poller = OutputStreamPoller::new("out", rx);
        for i in 0..3 {
            tx.send(Packet::new(Payload::Float32(i as f32)).at(Timestamp::new(i)))
                .unwrap();
        }
        assert_eq!(poller.queue_size(), 3);
        drop(tx);

        let timestamps: Vec<i64> = poller.map(|p| p.timestamp().value()).collect();
        assert_eq!(timestamps, vec![0, 1, 2]);
    }

    #[test]
    fn test_try_next_and_timeout() {
        let (tx, rx) = unbounded();
        let poller = OutputStreamPoller::new("out", rx);
        assert!(poller.try_next().is_none());
        assert!(poller.next_timeout(Duration::from_millis(5)).is_none());
        tx.send(Packet::empty_at(Timestamp::new(0))).unwrap();
        drop(tx);
        assert!(poller.try_next().is_some());
        assert!(poller.try_next().is_none());
        assert_eq!(poller.stream(), "out");
    }
}
