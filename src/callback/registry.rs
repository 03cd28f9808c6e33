//! Stream name → callback registry.
//!
//! The graph's delivery thread calls [`CallbackRegistry::dispatch`] for every
//! output packet. Packets on streams with no registration are dropped and
//! counted; they are not buffered for a later registration.

use crate::callback::handler::PacketCallback;
use crate::packet::Packet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Registration state of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Unregistered,
    Registered,
}

/// What happened to a dispatched packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The registered callback ran to completion.
    Delivered,
    /// No callback is registered for the stream; the packet was dropped.
    Unregistered,
    /// The callback panicked; the panic was contained.
    HandlerPanicked,
}

/// Delivery counters for one registered stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub delivered: u64,
    pub panicked: u64,
}

#[derive(Default)]
struct StreamCounters {
    delivered: AtomicU64,
    panicked: AtomicU64,
}

struct Registration {
    callback: Arc<dyn PacketCallback>,
    counters: Arc<StreamCounters>,
}

/// Thread-safe map from stream name to its callback. The last registration
/// for a stream replaces any earlier one.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: RwLock<HashMap<String, Registration>>,
    unregistered_drops: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `stream`, returning the callback it replaced.
    pub fn register(
        &self,
        stream: impl Into<String>,
        callback: Arc<dyn PacketCallback>,
    ) -> Option<Arc<dyn PacketCallback>> {
        let stream = stream.into();
        let previous = self.entries.write().insert(
            stream.clone(),
            Registration {
                callback,
                counters: Arc::new(StreamCounters::default()),
            },
        );
        match previous {
            Some(previous) => {
                tracing::warn!("Callback for stream '{}' replaced", stream);
                Some(previous.callback)
            }
            None => {
                tracing::debug!("Callback registered for stream '{}'", stream);
                None
            }
        }
    }

    pub fn unregister(&self, stream: &str) -> bool {
        self.entries.write().remove(stream).is_some()
    }

    pub fn state(&self, stream: &str) -> StreamState {
        if self.entries.read().contains_key(stream) {
            StreamState::Registered
        } else {
            StreamState::Unregistered
        }
    }

    pub fn is_registered(&self, stream: &str) -> bool {
        self.state(stream) == StreamState::Registered
    }

    /// Names of all registered streams, sorted.
    pub fn streams(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver `packet` to the callback registered for `stream`.
    ///
    /// Never panics and never returns an error: a missing registration drops
    /// the packet, a panicking callback is logged and the next packet is
    /// delivered normally.
    pub fn dispatch(&self, stream: &str, packet: &Packet) -> DispatchOutcome {
        // Clone out of the lock so callbacks may re-enter the registry.
        let target = self
            .entries
            .read()
            .get(stream)
            .map(|r| (r.callback.clone(), r.counters.clone()));

        let Some((callback, counters)) = target else {
            self.unregistered_drops.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                "Dropped packet on unregistered stream '{}' at {}",
                stream,
                packet.timestamp()
            );
            return DispatchOutcome::Unregistered;
        };

        match catch_unwind(AssertUnwindSafe(|| callback.on_packet(packet))) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Delivered
            }
            Err(panic) => {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    "Callback for stream '{}' panicked at {}: {}",
                    stream,
                    packet.timestamp(),
                    message
                );
                DispatchOutcome::HandlerPanicked
            }
        }
    }

    pub fn stats(&self, stream: &str) -> Option<StreamStats> {
        self.entries.read().get(stream).map(|r| StreamStats {
            delivered: r.counters.delivered.load(Ordering::Relaxed),
            panicked: r.counters.panicked.load(Ordering::Relaxed),
        })
    }

    /// Packets dropped because their stream had no registration.
    pub fn unregistered_drops(&self) -> u64 {
        self.unregistered_drops.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("streams", &self.streams())
            .field("unregistered_drops", &self.unregistered_drops())
            .finish()
    }
}
