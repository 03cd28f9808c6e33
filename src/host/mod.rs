//! Host side of the graph.
//!
//! A host app prepares a graph before it starts: it submits the input side
//! packets and registers callbacks for the output streams it cares about.
//! [`HostRuntime`] drives the lifecycle:
//!
//! ```text
//! initialize graph ──► HostApp::on_create ──► start_run ──► feed frames ──► close ──► wait
//!                       (side packets,          │
//!                        callbacks)             └── callbacks ──► HostBridge ──► HostApp::on_message
//! ```
//!
//! `on_create` runs exactly once, with the graph initialized and nothing
//! started, so the graph only starts after the side packets were handed
//! over.

pub mod bridge;
pub mod runtime;

pub use bridge::{HostBridge, HostMessage, HostSender, DEFAULT_HOST_CHANNEL_CAPACITY};
pub use runtime::{HostRuntime, RunReport};

use crate::callback::PacketCallback;
use crate::config::ConfiguredSidePacket;
use crate::error::{Result, ResultExt};
use crate::graph::GraphHandle;
use crate::packet::{Packet, PacketCreator, Timestamp};
use crate::side_packet::{SidePacketBundleBuilder, SidePacketValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A host application.
pub trait HostApp {
    fn name(&self) -> &str;

    /// Called once after the graph is initialized and before it starts.
    fn on_create(&mut self, ctx: &mut HostContext<'_>) -> Result<()>;

    /// Packet to feed on input `stream` for frame number `frame`. `None`
    /// skips the stream for this frame.
    fn input_packet(
        &self,
        creator: &PacketCreator,
        _stream: &str,
        frame: u32,
        timestamp: Timestamp,
    ) -> Option<Packet> {
        Some(creator.float32_packet(frame as f32, timestamp))
    }

    /// A message pushed by one of this app's callbacks, delivered on the
    /// host thread.
    fn on_message(&mut self, message: HostMessage) {
        tracing::info!(
            "[{}] '{}' at {}: {:?}",
            self.name(),
            message.stream(),
            message.timestamp(),
            message
        );
    }
}

/// What `on_create` gets to work with.
pub struct HostContext<'a> {
    graph: &'a mut dyn GraphHandle,
    sender: HostSender,
    configured: &'a BTreeMap<String, ConfiguredSidePacket>,
    submitted: bool,
}

impl<'a> HostContext<'a> {
    pub fn new(
        graph: &'a mut dyn GraphHandle,
        sender: HostSender,
        configured: &'a BTreeMap<String, ConfiguredSidePacket>,
    ) -> Self {
        Self {
            graph,
            sender,
            configured,
            submitted: false,
        }
    }

    pub fn packet_creator(&self) -> PacketCreator {
        self.graph.packet_creator()
    }

    /// A sender for callbacks that forward values to the host thread.
    pub fn sender(&self) -> HostSender {
        self.sender.clone()
    }

    /// Finalize `builder` and submit it as the graph's input side packets.
    /// Side packets from the host config are added last and win over the
    /// app's values.
    pub fn set_input_side_packets(&mut self, mut builder: SidePacketBundleBuilder) -> Result<()> {
        builder.extend(
            self.configured
                .iter()
                .map(|(key, value)| (key.as_str(), SidePacketValue::from(value))),
        );
        let bundle = builder.finalize();
        let count = bundle.len();
        self.graph
            .set_input_side_packets(bundle)
            .context("Failed to submit input side packets")?;
        self.submitted = true;
        tracing::debug!("Submitted {} input side packets", count);
        Ok(())
    }

    pub fn side_packets_submitted(&self) -> bool {
        self.submitted
    }

    pub fn add_packet_callback(
        &mut self,
        stream: &str,
        callback: Arc<dyn PacketCallback>,
    ) -> Result<()> {
        self.graph
            .add_packet_callback(stream, callback)
            .with_context(|| format!("Failed to register callback for '{}'", stream))
    }
}
