//! PassThroughCalculator: forwards input `i` to output `i`.
//!
//! Empty inputs are not forwarded. Input side packet `i` is copied to
//! output side packet `i` when the run opens.

use crate::graph::calculator::{CalculatorContext, NodeSpec};
use crate::graph::error::GraphResult;
use crate::graph::port::PortDescriptor;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("").repeated(),
    PortDescriptor::output("").repeated(),
    PortDescriptor::input_side_packet("", None).repeated(),
    PortDescriptor::output_side_packet("").repeated(),
];

pub struct PassThroughCalculator {
    streams: usize,
    side_packets: usize,
}

impl PassThroughCalculator {
    pub const NAME: &'static str = "PassThroughCalculator";

    pub fn new(spec: &NodeSpec) -> GraphResult<Self> {
        if spec.inputs.len() != spec.outputs.len() {
            return Err(spec.invalid(format!(
                "{} input streams but {} output streams",
                spec.inputs.len(),
                spec.outputs.len()
            )));
        }
        if spec.input_side_packets.len() != spec.output_side_packets.len() {
            return Err(spec.invalid(format!(
                "{} input side packets but {} output side packets",
                spec.input_side_packets.len(),
                spec.output_side_packets.len()
            )));
        }
        Ok(Self {
            streams: spec.inputs.len(),
            side_packets: spec.input_side_packets.len(),
        })
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn open(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        for port in 0..self.side_packets {
            if let Some(value) = ctx.side_packet(port).cloned() {
                ctx.set_output_side_packet(port, value)?;
            }
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        for port in 0..self.streams {
            let Some(packet) = ctx.input(port) else {
                continue;
            };
            if !packet.is_empty() {
                let packet = packet.clone();
                ctx.output(port, packet)?;
            }
        }
        Ok(())
    }
}
