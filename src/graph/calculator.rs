//! Calculator abstraction for the graph engine.
//!
//! Two-layer design:
//! - **`Calculator` trait** for host-provided calculators registered on a
//!   [`CalculatorFactory`].
//! - **`BuiltinCalculator` enum** for the calculators shipped with the
//!   crate, dispatched with a match.
//!
//! `AnyCalculator` wraps either so the scheduler treats both uniformly.

use crate::config::NodeConfig;
use crate::graph::calculators::{
    PassThroughCalculator, ScoresToDetectionsCalculator, SidePacketToStreamCalculator,
};
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::port::{check_ports, PortDescriptor, PortDirection};
use crate::graph::stream::TagMap;
use crate::packet::{Packet, Payload, Timestamp};
use crate::side_packet::{SidePacketKey, SidePacketValue};
use std::collections::HashMap;
use std::sync::Arc;

/// A node description with its connections parsed.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub calculator: String,
    pub inputs: TagMap,
    pub outputs: TagMap,
    pub input_side_packets: TagMap,
    pub output_side_packets: TagMap,
    pub subgraph: Option<String>,
    pub options: toml::Table,
}

impl NodeSpec {
    pub fn from_config(index: usize, config: &NodeConfig) -> GraphResult<Self> {
        Ok(Self {
            name: config.display_name(index),
            calculator: config.calculator.clone(),
            inputs: TagMap::parse(&config.input_stream)?,
            outputs: TagMap::parse(&config.output_stream)?,
            input_side_packets: TagMap::parse(&config.input_side_packet)?,
            output_side_packets: TagMap::parse(&config.output_side_packet)?,
            subgraph: config.subgraph.clone(),
            options: config.options.clone(),
        })
    }

    /// Bundle key this node reads the side packet `name` from.
    pub fn side_packet_key(&self, name: &str) -> SidePacketKey {
        match &self.subgraph {
            Some(subgraph) => SidePacketKey::in_subgraph(subgraph, name),
            None => SidePacketKey::new(name),
        }
    }

    pub(crate) fn invalid(&self, reason: impl Into<String>) -> GraphError {
        GraphError::InvalidNode {
            node: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// Numeric option; integers are accepted where a float is expected.
    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
    }

    pub fn option_usize(&self, key: &str) -> Option<usize> {
        self.options
            .get(key)
            .and_then(|v| v.as_integer())
            .and_then(|i| usize::try_from(i).ok())
    }
}

/// Everything a calculator sees during one `open`, `process` or `close`
/// call.
pub struct CalculatorContext<'a> {
    spec: &'a NodeSpec,
    timestamp: Timestamp,
    inputs: &'a [Packet],
    side_packets: &'a [SidePacketValue],
    outputs: &'a mut Vec<(usize, Packet)>,
    output_side_packets: &'a mut [Option<SidePacketValue>],
}

impl<'a> CalculatorContext<'a> {
    pub(crate) fn new(
        spec: &'a NodeSpec,
        timestamp: Timestamp,
        inputs: &'a [Packet],
        side_packets: &'a [SidePacketValue],
        outputs: &'a mut Vec<(usize, Packet)>,
        output_side_packets: &'a mut [Option<SidePacketValue>],
    ) -> Self {
        Self {
            spec,
            timestamp,
            inputs,
            side_packets,
            outputs,
            output_side_packets,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &NodeSpec {
        self.spec
    }

    /// Timestamp of the current input set. `UNSTARTED` during `open` and
    /// `DONE` during `close`.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Packet on input port `port`; an empty packet when the port has no
    /// data at this timestamp.
    pub fn input(&self, port: usize) -> Option<&Packet> {
        self.inputs.get(port)
    }

    pub fn input_tagged(&self, tag: &str, index: u32) -> Option<&Packet> {
        self.spec
            .inputs
            .port(tag, index)
            .and_then(|p| self.inputs.get(p))
    }

    pub fn side_packet_count(&self) -> usize {
        self.side_packets.len()
    }

    pub fn side_packet(&self, port: usize) -> Option<&SidePacketValue> {
        self.side_packets.get(port)
    }

    pub fn side_packet_tagged(&self, tag: &str, index: u32) -> Option<&SidePacketValue> {
        self.spec
            .input_side_packets
            .port(tag, index)
            .and_then(|p| self.side_packets.get(p))
    }

    pub fn output_count(&self) -> usize {
        self.spec.outputs.len()
    }

    /// Emit `packet` on output port `port`.
    pub fn output(&mut self, port: usize, packet: Packet) -> GraphResult<()> {
        if port >= self.spec.outputs.len() {
            return Err(GraphError::calculator(
                &self.spec.name,
                format!("output port {} out of range", port),
            ));
        }
        self.outputs.push((port, packet));
        Ok(())
    }

    /// Emit `payload` on output port `port` at the current input timestamp.
    pub fn output_payload(&mut self, port: usize, payload: Payload) -> GraphResult<()> {
        let packet = Packet::new(payload).at(self.timestamp);
        self.output(port, packet)
    }

    pub fn output_tagged(&mut self, tag: &str, index: u32, packet: Packet) -> GraphResult<()> {
        match self.spec.outputs.port(tag, index) {
            Some(port) => self.output(port, packet),
            None => Err(GraphError::calculator(
                &self.spec.name,
                format!("no output {}:{}", tag, index),
            )),
        }
    }

    pub fn set_output_side_packet(&mut self, port: usize, value: SidePacketValue) -> GraphResult<()> {
        match self.output_side_packets.get_mut(port) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(GraphError::calculator(
                &self.spec.name,
                format!("output side packet {} out of range", port),
            )),
        }
    }
}

/// Trait for host-provided calculators.
pub trait Calculator: Send {
    fn name(&self) -> &str;

    /// Tags this calculator accepts.
    fn ports(&self) -> &[PortDescriptor];

    /// Called once when the run starts, after side packets are resolved.
    fn open(&mut self, _ctx: &mut CalculatorContext) -> GraphResult<()> {
        Ok(())
    }

    /// Called for every timestamp at which an input carries a packet.
    fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()>;

    /// Called once after every graph input stream is closed.
    fn close(&mut self, _ctx: &mut CalculatorContext) -> GraphResult<()> {
        Ok(())
    }
}

/// Enum dispatch for the built-in calculators.
pub enum BuiltinCalculator {
    PassThrough(PassThroughCalculator),
    SidePacketToStream(SidePacketToStreamCalculator),
    ScoresToDetections(ScoresToDetectionsCalculator),
}

impl BuiltinCalculator {
    /// Construct the built-in named `calculator`, if there is one.
    pub fn create(spec: &NodeSpec) -> Option<GraphResult<Self>> {
        let created = match spec.calculator.as_str() {
            PassThroughCalculator::NAME => {
                PassThroughCalculator::new(spec).map(BuiltinCalculator::PassThrough)
            }
            SidePacketToStreamCalculator::NAME => {
                SidePacketToStreamCalculator::new(spec).map(BuiltinCalculator::SidePacketToStream)
            }
            ScoresToDetectionsCalculator::NAME => {
                ScoresToDetectionsCalculator::new(spec).map(BuiltinCalculator::ScoresToDetections)
            }
            _ => return None,
        };
        Some(created)
    }

    pub fn names() -> &'static [&'static str] {
        &[
            PassThroughCalculator::NAME,
            SidePacketToStreamCalculator::NAME,
            ScoresToDetectionsCalculator::NAME,
        ]
    }

    pub fn name(&self) -> &str {
        match self {
            BuiltinCalculator::PassThrough(_) => PassThroughCalculator::NAME,
            BuiltinCalculator::SidePacketToStream(_) => SidePacketToStreamCalculator::NAME,
            BuiltinCalculator::ScoresToDetections(_) => ScoresToDetectionsCalculator::NAME,
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            BuiltinCalculator::PassThrough(c) => c.ports(),
            BuiltinCalculator::SidePacketToStream(c) => c.ports(),
            BuiltinCalculator::ScoresToDetections(c) => c.ports(),
        }
    }

    pub fn open(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            BuiltinCalculator::PassThrough(c) => c.open(ctx),
            BuiltinCalculator::SidePacketToStream(c) => c.open(ctx),
            BuiltinCalculator::ScoresToDetections(c) => c.open(ctx),
        }
    }

    pub fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            BuiltinCalculator::PassThrough(c) => c.process(ctx),
            BuiltinCalculator::SidePacketToStream(c) => c.process(ctx),
            BuiltinCalculator::ScoresToDetections(c) => c.process(ctx),
        }
    }

    pub fn close(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            BuiltinCalculator::PassThrough(_) => Ok(()),
            BuiltinCalculator::SidePacketToStream(c) => c.close(ctx),
            BuiltinCalculator::ScoresToDetections(_) => Ok(()),
        }
    }
}

/// Wrapper that holds either a built-in calculator or a host-provided one.
pub enum AnyCalculator {
    Builtin(BuiltinCalculator),
    Custom(Box<dyn Calculator>),
}

impl AnyCalculator {
    pub fn name(&self) -> &str {
        match self {
            AnyCalculator::Builtin(c) => c.name(),
            AnyCalculator::Custom(c) => c.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            AnyCalculator::Builtin(c) => c.ports(),
            AnyCalculator::Custom(c) => c.ports(),
        }
    }

    pub fn open(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            AnyCalculator::Builtin(c) => c.open(ctx),
            AnyCalculator::Custom(c) => c.open(ctx),
        }
    }

    pub fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            AnyCalculator::Builtin(c) => c.process(ctx),
            AnyCalculator::Custom(c) => c.process(ctx),
        }
    }

    pub fn close(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        match self {
            AnyCalculator::Builtin(c) => c.close(ctx),
            AnyCalculator::Custom(c) => c.close(ctx),
        }
    }
}

impl std::fmt::Debug for AnyCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnyCalculator({})", self.name())
    }
}

type Constructor = Arc<dyn Fn(&NodeSpec) -> GraphResult<Box<dyn Calculator>> + Send + Sync>;

/// Maps calculator names to constructors.
///
/// Built-in calculators are always available. Hosts add their own with
/// [`register`](Self::register); a registered name shadows a built-in one.
/// Each graph gets its own factory, there is no process-wide registry.
#[derive(Clone, Default)]
pub struct CalculatorFactory {
    custom: HashMap<String, Constructor>,
}

impl CalculatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeSpec) -> GraphResult<Box<dyn Calculator>> + Send + Sync + 'static,
    {
        let name = name.into();
        if BuiltinCalculator::names().contains(&name.as_str()) {
            tracing::debug!("Calculator '{}' shadows the built-in of the same name", name);
        }
        self.custom.insert(name, Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || BuiltinCalculator::names().contains(&name)
    }

    /// All known calculator names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .custom
            .keys()
            .cloned()
            .chain(BuiltinCalculator::names().iter().map(|n| n.to_string()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Build the calculator for `spec` and check its connections against the
    /// calculator's port descriptors.
    pub fn create(&self, spec: &NodeSpec) -> GraphResult<AnyCalculator> {
        let calculator = if let Some(constructor) = self.custom.get(&spec.calculator) {
            AnyCalculator::Custom(constructor(spec)?)
        } else {
            match BuiltinCalculator::create(spec) {
                Some(created) => AnyCalculator::Builtin(created?),
                None => return Err(GraphError::UnknownCalculator(spec.calculator.clone())),
            }
        };

        let ports = calculator.ports();
        check_ports(&spec.name, ports, &spec.inputs, PortDirection::Input, false)?;
        check_ports(&spec.name, ports, &spec.outputs, PortDirection::Output, false)?;
        check_ports(
            &spec.name,
            ports,
            &spec.input_side_packets,
            PortDirection::Input,
            true,
        )?;
        check_ports(
            &spec.name,
            ports,
            &spec.output_side_packets,
            PortDirection::Output,
            true,
        )?;

        Ok(calculator)
    }
}

impl std::fmt::Debug for CalculatorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorFactory")
            .field("names", &self.names())
            .finish()
    }
}
