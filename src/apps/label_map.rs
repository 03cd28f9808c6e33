//! Hands two label-map file paths to the graph.

use crate::callback::{DecodingCallback, StringDecoder};
use crate::error::Result;
use crate::host::{HostApp, HostContext, HostMessage};
use crate::side_packet::SidePacketBundleBuilder;
use std::sync::Arc;

pub const LABEL_MAP_FILES: [(&str, &str); 2] = [
    ("file_path0", "labelmap0.txt"),
    ("file_path1", "labelmap1.txt"),
];

/// Streams the default graph echoes the paths on.
const PATH_STREAMS: [&str; 2] = ["label_map_path0", "label_map_path1"];

#[derive(Debug, Default)]
pub struct LabelMapApp {
    paths: Vec<String>,
}

impl LabelMapApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths echoed back by the graph so far.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl HostApp for LabelMapApp {
    fn name(&self) -> &str {
        "label-map"
    }

    fn on_create(&mut self, ctx: &mut HostContext<'_>) -> Result<()> {
        let creator = ctx.packet_creator();
        let mut builder = SidePacketBundleBuilder::new();
        for (key, path) in LABEL_MAP_FILES {
            builder.put(key, creator.create_string(path));
        }
        ctx.set_input_side_packets(builder)?;

        for stream in PATH_STREAMS {
            let sender = ctx.sender();
            let callback = DecodingCallback::new(stream, StringDecoder, move |timestamp, text| {
                sender.send(HostMessage::Text {
                    stream: stream.to_string(),
                    timestamp,
                    text,
                });
            });
            // Custom graphs need not echo the paths.
            if let Err(e) = ctx.add_packet_callback(stream, Arc::new(callback)) {
                tracing::debug!("No path echo on '{}': {}", stream, e);
            }
        }
        Ok(())
    }

    fn on_message(&mut self, message: HostMessage) {
        if let HostMessage::Text { stream, text, .. } = message {
            tracing::info!("Label map on '{}': {}", stream, text);
            self.paths.push(text);
        }
    }
}
