//! Input stream handlers: when a node with several inputs gets to run.
//!
//! - **Immediate** runs the node as soon as any input carries a packet. Inputs
//!   without a packet at that timestamp are filled with empty packets.
//! - **Synchronized** queues packets per input and runs the node at a
//!   timestamp only once every input has either delivered a packet there or
//!   moved its bound past it.

use crate::packet::{Packet, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputStreamHandler {
    #[default]
    Immediate,
    #[serde(alias = "default")]
    Synchronized,
}

impl fmt::Display for InputStreamHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputStreamHandler::Immediate => write!(f, "immediate"),
            InputStreamHandler::Synchronized => write!(f, "synchronized"),
        }
    }
}

/// Per-input packet queues of a synchronized node.
#[derive(Debug, Clone)]
pub(crate) struct InputQueues {
    queues: Vec<BTreeMap<Timestamp, Packet>>,
}

impl InputQueues {
    pub(crate) fn new(inputs: usize) -> Self {
        Self {
            queues: vec![BTreeMap::new(); inputs],
        }
    }

    pub(crate) fn push(&mut self, port: usize, packet: Packet) {
        if let Some(queue) = self.queues.get_mut(port) {
            queue.insert(packet.timestamp(), packet);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queues.iter().all(BTreeMap::is_empty)
    }

    /// Earliest timestamp the node can run at, given each input's bound
    /// (the smallest timestamp its stream may still carry).
    ///
    /// Inputs holding a packet count at that packet's timestamp. Empty
    /// inputs are settled up to the timestamp before their bound.
    pub(crate) fn next_ready(&self, bounds: &[Timestamp]) -> Option<Timestamp> {
        let mut min_packet = Timestamp::DONE;
        let mut min_bound = Timestamp::DONE;
        for (queue, &bound) in self.queues.iter().zip(bounds) {
            match queue.keys().next() {
                Some(&timestamp) => min_packet = min_packet.min(timestamp),
                None => min_bound = min_bound.min(bound),
            }
        }
        if min_packet == Timestamp::DONE {
            return None;
        }

        let settled = if min_bound == Timestamp::DONE {
            Timestamp::DONE
        } else {
            min_bound.previous_allowed_in_stream()
        };
        (min_packet <= settled).then_some(min_packet)
    }

    /// Take the packets at `timestamp`, one per input, empty where an input
    /// has none.
    pub(crate) fn pop_set(&mut self, timestamp: Timestamp) -> Vec<Packet> {
        self.queues
            .iter_mut()
            .map(|queue| {
                queue
                    .remove(&timestamp)
                    .unwrap_or_else(|| Packet::empty_at(timestamp))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Payload;

    fn packet(value: f32, at: i64) -> Packet {
        Packet::new(Payload::Float32(value)).at(Timestamp::new(at))
    }

    #[test]
    fn test_waits_for_every_input() {
        let mut queues = InputQueues::new(2);
        queues.push(0, packet(1.0, 5));
        // Input 1 has published nothing yet.
        assert_eq!(queues.next_ready(&[Timestamp::new(6), Timestamp::PRE_STREAM]), None);

        queues.push(1, packet(2.0, 5));
        let ready = queues.next_ready(&[Timestamp::new(6), Timestamp::new(6)]);
        assert_eq!(ready, Some(Timestamp::new(5)));

        let set = queues.pop_set(Timestamp::new(5));
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|p| !p.is_empty()));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_bound_past_timestamp_releases_set() {
        let mut queues = InputQueues::new(2);
        queues.push(0, packet(1.0, 5));
        // Input 1 last carried 4: 5 is still open.
        assert_eq!(queues.next_ready(&[Timestamp::new(6), Timestamp::new(5)]), None);
        // Input 1 moved on to 7: nothing can arrive at 5 any more.
        assert_eq!(
            queues.next_ready(&[Timestamp::new(6), Timestamp::new(8)]),
            Some(Timestamp::new(5))
        );

        let set = queues.pop_set(Timestamp::new(5));
        assert!(!set[0].is_empty());
        assert!(set[1].is_empty());
        assert_eq!(set[1].timestamp(), Timestamp::new(5));
    }

    #[test]
    fn test_done_inputs_release_everything() {
        let mut queues = InputQueues::new(2);
        queues.push(0, Packet::new(Payload::Float32(1.0)).at(Timestamp::POST_STREAM));
        assert_eq!(
            queues.next_ready(&[Timestamp::DONE, Timestamp::DONE]),
            Some(Timestamp::POST_STREAM)
        );
    }

    #[test]
    fn test_nothing_queued() {
        let queues = InputQueues::new(1);
        assert_eq!(queues.next_ready(&[Timestamp::DONE]), None);
    }

    #[test]
    fn test_handler_names() {
        let parsed: InputStreamHandler = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(parsed, InputStreamHandler::Synchronized);
        assert_eq!(InputStreamHandler::default().to_string(), "immediate");
    }
}
