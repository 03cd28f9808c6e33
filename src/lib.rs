//! # graphlink: typed side packets and output callbacks for a packet graph
//!
//! A host prepares a packet graph before it runs: it hands over a bundle of
//! typed *input side packets* (strings, floats, encoded messages) and
//! registers *callbacks* on output streams. While the graph runs, each
//! packet on an observed stream is decoded into a typed value and handed to
//! the host's callback.
//!
//! ## Architecture
//!
//! - **packet / side_packet**: payloads, timestamps, side-packet keys and
//!   the bundle builder (last write wins, `<subgraph>__<name>` addressing)
//! - **callback**: decoders, decoding callbacks and the per-stream registry
//! - **graph**: the engine, its calculators and the [`GraphHandle`] seam
//! - **host**: the host lifecycle (`on_create` before start) and the
//!   callback → host bridge
//! - **apps**: the built-in host apps
//!
//! ## Configuration
//!
//! The binary reads `host.toml` from the platform config directory under
//! `graphlink` (see [`config`]); graphs are TOML files (see
//! [`config::GraphConfig`]).
//!
//! ## Example
//!
//! ```ignore
//! use graphlink::{apps, config::{AppKind, HostConfig}, host::HostRuntime};
//!
//! fn main() -> graphlink::Result<()> {
//!     let config = HostConfig::load_or_default(None);
//!     let graph = apps::builtin_graph(AppKind::OutputValue)?;
//!     let mut app = apps::create(AppKind::OutputValue);
//!     let report = HostRuntime::new(config).run(app.as_mut(), &graph)?;
//!     println!("{} packets sent", report.packets_sent);
//!     Ok(())
//! }
//! ```

pub mod apps;
pub mod callback;
pub mod config;
pub mod error;
pub mod formats;
pub mod graph;
pub mod host;
pub mod packet;
pub mod side_packet;

// Re-export commonly used types
pub use callback::{CallbackRegistry, DecodingCallback, PacketCallback};
pub use config::{GraphConfig, HostConfig};
pub use error::{GraphLinkError, Result};
pub use graph::{GraphError, GraphHandle, PacketGraph};
pub use host::{HostApp, HostContext, HostRuntime};
pub use packet::{Packet, PacketCreator, PacketGetter, Timestamp};
pub use side_packet::{SidePacketBundle, SidePacketBundleBuilder, SidePacketValue};
