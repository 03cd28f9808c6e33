//! Packet callbacks.
//!
//! [`PacketCallback`] is the single-method interface the registry invokes
//! once per packet. [`DecodingCallback`] pairs a [`PacketDecoder`] with a
//! consumer and turns decode failures into log lines instead of faults.

use crate::callback::decoder::PacketDecoder;
use crate::packet::{DecodeError, Packet, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};

/// Invoked by the graph's delivery thread for every packet on one stream.
///
/// Implementations run on a thread the host does not control and may be
/// called concurrently with host code; any host state they touch must be
/// synchronised or marshalled back through a channel.
pub trait PacketCallback: Send + Sync {
    fn on_packet(&self, packet: &Packet);
}

impl<F> PacketCallback for F
where
    F: Fn(&Packet) + Send + Sync,
{
    fn on_packet(&self, packet: &Packet) {
        self(packet)
    }
}

/// Counters kept by a [`DecodingCallback`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets decoded and handed to the consumer.
    pub decoded: u64,
    /// Empty packets on a decoder that needs a value.
    pub empty: u64,
    /// Packets with a wrong payload type or malformed bytes.
    pub failed: u64,
}

/// Decodes each packet with `D` and hands the value to `F`.
///
/// Decode failures are logged and counted per packet; the stream keeps
/// flowing.
pub struct DecodingCallback<D, F> {
    stream: String,
    decoder: D,
    consumer: F,
    decoded: AtomicU64,
    empty: AtomicU64,
    failed: AtomicU64,
}

impl<D, F> DecodingCallback<D, F>
where
    D: PacketDecoder,
    F: Fn(Timestamp, D::Output) + Send + Sync,
{
    pub fn new(stream: impl Into<String>, decoder: D, consumer: F) -> Self {
        Self {
            stream: stream.into(),
            decoder,
            consumer,
            decoded: AtomicU64::new(0),
            empty: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn stats(&self) -> DecodeStats {
        DecodeStats {
            decoded: self.decoded.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record_failure(&self, packet: &Packet, err: &DecodeError) {
        if err.is_empty() {
            self.empty.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Empty packet on '{}' at {} skipped",
                self.stream,
                packet.timestamp()
            );
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "Failed to decode packet on '{}' at {} as {}: {}",
                self.stream,
                packet.timestamp(),
                self.decoder.expected(),
                err
            );
        }
    }
}

impl<D, F> PacketCallback for DecodingCallback<D, F>
where
    D: PacketDecoder,
    F: Fn(Timestamp, D::Output) + Send + Sync,
{
    fn on_packet(&self, packet: &Packet) {
        match self.decoder.decode(packet) {
            Ok(value) => {
                self.decoded.fetch_add(1, Ordering::Relaxed);
                (self.consumer)(packet.timestamp(), value);
            }
            Err(e) => self.record_failure(packet, &e),
        }
    }
}
