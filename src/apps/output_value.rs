//! Passes a float and a subgraph-scoped string to the graph and logs the
//! `output_value` stream when trace logging is on.

use crate::callback::{DecodingCallback, Float32VectorDecoder, StringDecoder};
use crate::error::Result;
use crate::host::{HostApp, HostContext, HostMessage};
use crate::side_packet::{SidePacketBundleBuilder, SidePacketKey};
use std::sync::Arc;
use tracing::Level;

pub const OUTPUT_VALUE_STREAM: &str = "output_value";
pub const SUBGRAPH_MESSAGE_STREAM: &str = "subgraph_message";
pub const USER_VALUE: f32 = -4.4;
pub const SUBGRAPH_NAME: &str = "testsubgraph";
pub const SUBGRAPH_MESSAGE: &str = "Input Side Packet...";

#[derive(Debug, Default)]
pub struct OutputValueApp {
    values: Vec<Vec<f32>>,
}

impl OutputValueApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[Vec<f32>] {
        &self.values
    }

    /// Whether the `output_value` callback gets registered.
    pub fn verbose() -> bool {
        tracing::enabled!(Level::TRACE)
    }
}

impl HostApp for OutputValueApp {
    fn name(&self) -> &str {
        "output-value"
    }

    fn on_create(&mut self, ctx: &mut HostContext<'_>) -> Result<()> {
        let creator = ctx.packet_creator();
        let builder = SidePacketBundleBuilder::new()
            .with("user_value_0", creator.create_float32(USER_VALUE))
            .with(
                SidePacketKey::in_subgraph(SUBGRAPH_NAME, "user_value_0"),
                creator.create_string(SUBGRAPH_MESSAGE),
            );
        ctx.set_input_side_packets(builder)?;

        if Self::verbose() {
            let sender = ctx.sender();
            let callback = DecodingCallback::new(
                OUTPUT_VALUE_STREAM,
                Float32VectorDecoder,
                move |timestamp, values: Vec<f32>| {
                    tracing::trace!("output_value is {:?} ({})", values, timestamp);
                    sender.send(HostMessage::Values {
                        stream: OUTPUT_VALUE_STREAM.to_string(),
                        timestamp,
                        values,
                    });
                },
            );
            ctx.add_packet_callback(OUTPUT_VALUE_STREAM, Arc::new(callback))?;
        } else {
            tracing::debug!("Trace logging off, not observing '{}'", OUTPUT_VALUE_STREAM);
        }

        let sender = ctx.sender();
        let callback = DecodingCallback::new(
            SUBGRAPH_MESSAGE_STREAM,
            StringDecoder,
            move |timestamp, text| {
                sender.send(HostMessage::Text {
                    stream: SUBGRAPH_MESSAGE_STREAM.to_string(),
                    timestamp,
                    text,
                });
            },
        );
        if let Err(e) = ctx.add_packet_callback(SUBGRAPH_MESSAGE_STREAM, Arc::new(callback)) {
            tracing::debug!("No subgraph echo: {}", e);
        }
        Ok(())
    }

    fn on_message(&mut self, message: HostMessage) {
        match message {
            HostMessage::Values { values, .. } => self.values.push(values),
            HostMessage::Text { text, .. } => tracing::info!("Subgraph says: {}", text),
            HostMessage::Detections { .. } => {}
        }
    }
}
