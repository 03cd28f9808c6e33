//! Input side packets.
//!
//! Side packets are values supplied to a graph before it starts running,
//! outside the regular stream data path. A host builds a
//! [`SidePacketBundle`] with [`SidePacketBundleBuilder`] and submits it once
//! through [`GraphHandle::set_input_side_packets`](crate::graph::GraphHandle).
//!
//! Keys of the form `<subgraph>__<name>` address a value into a nested
//! subgraph's namespace; see [`SidePacketKey`].

pub mod bundle;
pub mod key;
pub mod value;

pub use bundle::{SidePacketBundle, SidePacketBundleBuilder};
pub use key::{SidePacketKey, SUBGRAPH_SEPARATOR};
pub use value::{SidePacketKind, SidePacketValue};
