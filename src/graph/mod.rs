//! Graph engine and the host-facing graph handle.
//!
//! Packets flow through calculators wired by named streams:
//!
//! ```text
//! host ──add_packet_to_input_stream──► [calculator] ──► [calculator] ──► callbacks / pollers
//!                                           ▲
//!                               input side packets (once, before start)
//! ```
//!
//! # Design
//!
//! - **`GraphHandle`** is the narrow seam a host app sees: a packet creator,
//!   one-shot side-packet submission and callback registration.
//! - **`PacketGraph`** implements it with a scheduler thread that runs nodes
//!   level by level in topological order per arriving packet. Nodes of one
//!   level run in parallel when their executor has more than one thread.
//! - **Input stream handlers** decide when a node with several inputs runs.
//! - **Enum dispatch** for built-in calculators, trait objects for host ones.

pub mod calculator;
pub mod calculators;
pub mod engine;
pub mod error;
pub mod executor;
pub mod handler;
pub mod id;
pub mod poller;
pub mod port;
pub mod stream;

pub use calculator::{
    AnyCalculator, BuiltinCalculator, Calculator, CalculatorContext, CalculatorFactory, NodeSpec,
};
pub use engine::{GraphState, PacketGraph, DEFAULT_INPUT_CHANNEL_CAPACITY};
pub use error::{GraphError, GraphResult};
pub use executor::DEFAULT_EXECUTOR;
pub use handler::InputStreamHandler;
pub use id::{NodeId, StreamId};
pub use poller::OutputStreamPoller;
pub use port::{PortDescriptor, PortDirection, PortKind};
pub use stream::{StreamSpec, TagMap};

use crate::callback::PacketCallback;
use crate::packet::PacketCreator;
use crate::side_packet::SidePacketBundle;
use std::sync::Arc;

/// What a host app can do with a graph before it starts.
#[cfg_attr(test, mockall::automock)]
pub trait GraphHandle {
    /// Factory for side-packet values and stream packets.
    fn packet_creator(&self) -> PacketCreator;

    /// Submit the input side packets. Accepted once, before the graph
    /// starts; a later call fails with [`GraphError::AlreadyStarted`] or
    /// [`GraphError::SidePacketsAlreadySet`].
    fn set_input_side_packets(&mut self, bundle: SidePacketBundle) -> GraphResult<()>;

    /// Register `callback` for `stream`. The last registration for a stream
    /// wins.
    fn add_packet_callback(
        &mut self,
        stream: &str,
        callback: Arc<dyn PacketCallback>,
    ) -> GraphResult<()>;
}
