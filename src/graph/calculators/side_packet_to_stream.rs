//! SidePacketToStreamCalculator: emits side packet `i` on output `i`.
//!
//! The `at` option picks when: `"prestream"` (default) emits once at
//! `PRE_STREAM` when the run opens, `"poststream"` once at `POST_STREAM`
//! when it closes, and `"tick"` at every timestamp seen on the `TICK` input.

use crate::graph::calculator::{CalculatorContext, NodeSpec};
use crate::graph::error::GraphResult;
use crate::graph::port::PortDescriptor;
use crate::packet::{Packet, Timestamp};

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("TICK").optional(),
    PortDescriptor::output("").repeated(),
    PortDescriptor::input_side_packet("", None).repeated(),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitAt {
    PreStream,
    PostStream,
    Tick,
}

impl EmitAt {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "prestream" => Some(EmitAt::PreStream),
            "poststream" => Some(EmitAt::PostStream),
            "tick" => Some(EmitAt::Tick),
            _ => None,
        }
    }
}

pub struct SidePacketToStreamCalculator {
    at: EmitAt,
    count: usize,
}

impl SidePacketToStreamCalculator {
    pub const NAME: &'static str = "SidePacketToStreamCalculator";

    pub fn new(spec: &NodeSpec) -> GraphResult<Self> {
        let at = match spec.option_str("at") {
            None => EmitAt::PreStream,
            Some(value) => EmitAt::parse(value)
                .ok_or_else(|| spec.invalid(format!("unknown 'at' option '{}'", value)))?,
        };

        let has_tick = spec.inputs.port("TICK", 0).is_some();
        if (at == EmitAt::Tick) != has_tick {
            return Err(spec.invalid("a TICK input is required exactly when at = \"tick\""));
        }
        if spec.outputs.len() != spec.input_side_packets.len() {
            return Err(spec.invalid(format!(
                "{} input side packets but {} output streams",
                spec.input_side_packets.len(),
                spec.outputs.len()
            )));
        }

        Ok(Self {
            at,
            count: spec.outputs.len(),
        })
    }

    pub fn emit_at(&self) -> EmitAt {
        self.at
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn emit_all(&self, ctx: &mut CalculatorContext, timestamp: Timestamp) -> GraphResult<()> {
        for port in 0..self.count {
            if let Some(value) = ctx.side_packet(port) {
                let packet = Packet::new(value.to_payload()).at(timestamp);
                ctx.output(port, packet)?;
            }
        }
        Ok(())
    }

    pub fn open(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        if self.at == EmitAt::PreStream {
            self.emit_all(ctx, Timestamp::PRE_STREAM)?;
        }
        Ok(())
    }

    pub fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        if self.at == EmitAt::Tick {
            let timestamp = ctx.timestamp();
            self.emit_all(ctx, timestamp)?;
        }
        Ok(())
    }

    pub fn close(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        if self.at == EmitAt::PostStream {
            self.emit_all(ctx, Timestamp::POST_STREAM)?;
        }
        Ok(())
    }
}
