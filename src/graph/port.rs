//! Port descriptors for calculators.
//!
//! Each calculator declares the tags it accepts via a static
//! `PortDescriptor` array. The engine checks node specs against it when the
//! graph is initialized and checks side-packet kinds when the run starts.

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::stream::TagMap;
use crate::side_packet::SidePacketKind;

/// What flows through a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Timestamped packets.
    Stream,
    /// A single value fixed for the run. `None` accepts any kind.
    SidePacket(Option<SidePacketKind>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

/// Static descriptor for one tag of a calculator.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub tag: &'static str,
    pub direction: PortDirection,
    pub kind: PortKind,
    /// Whether the tag may appear with several indices.
    pub multiple: bool,
    pub optional: bool,
}

impl PortDescriptor {
    pub const fn input(tag: &'static str) -> Self {
        Self {
            tag,
            direction: PortDirection::Input,
            kind: PortKind::Stream,
            multiple: false,
            optional: false,
        }
    }

    pub const fn output(tag: &'static str) -> Self {
        Self {
            tag,
            direction: PortDirection::Output,
            kind: PortKind::Stream,
            multiple: false,
            optional: false,
        }
    }

    pub const fn input_side_packet(tag: &'static str, expects: Option<SidePacketKind>) -> Self {
        Self {
            tag,
            direction: PortDirection::Input,
            kind: PortKind::SidePacket(expects),
            multiple: false,
            optional: false,
        }
    }

    pub const fn output_side_packet(tag: &'static str) -> Self {
        Self {
            tag,
            direction: PortDirection::Output,
            kind: PortKind::SidePacket(None),
            multiple: false,
            optional: false,
        }
    }

    pub const fn repeated(mut self) -> Self {
        self.multiple = true;
        self.optional = true;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn matches(&self, direction: PortDirection, side_packet: bool) -> bool {
        self.direction == direction && matches!(self.kind, PortKind::SidePacket(_)) == side_packet
    }
}

/// Check one side of a node against a calculator's descriptors.
pub(crate) fn check_ports(
    node: &str,
    ports: &[PortDescriptor],
    map: &TagMap,
    direction: PortDirection,
    side_packet: bool,
) -> GraphResult<()> {
    let what = match (direction, side_packet) {
        (PortDirection::Input, false) => "input stream",
        (PortDirection::Output, false) => "output stream",
        (PortDirection::Input, true) => "input side packet",
        (PortDirection::Output, true) => "output side packet",
    };
    let relevant: Vec<&PortDescriptor> = ports
        .iter()
        .filter(|p| p.matches(direction, side_packet))
        .collect();

    for tag in map.tags() {
        let Some(port) = relevant.iter().find(|p| p.tag == tag) else {
            return Err(GraphError::InvalidNode {
                node: node.to_string(),
                reason: format!("unexpected {} tag '{}'", what, tag),
            });
        };
        if !port.multiple && map.tag_count(tag) > 1 {
            return Err(GraphError::InvalidNode {
                node: node.to_string(),
                reason: format!("{} tag '{}' may appear only once", what, tag),
            });
        }
    }

    for port in relevant {
        if !port.optional && map.tag_count(port.tag) == 0 {
            return Err(GraphError::InvalidNode {
                node: node.to_string(),
                reason: format!("missing required {} tag '{}'", what, port.tag),
            });
        }
    }

    Ok(())
}

/// Expected kind of the side packet on `tag`, if the calculator pins one.
pub(crate) fn expected_side_packet_kind(
    ports: &[PortDescriptor],
    tag: &str,
) -> Option<SidePacketKind> {
    ports.iter().find_map(|p| match p.kind {
        PortKind::SidePacket(expects)
            if p.direction == PortDirection::Input && p.tag == tag =>
        {
            expects
        }
        _ => None,
    })
}
