//! Observes single and batched detections produced from a score vector.

use crate::callback::{DecodingCallback, MessageDecoder, MessageVecDecoder};
use crate::error::Result;
use crate::formats::Detection;
use crate::host::{HostApp, HostContext, HostMessage};
use crate::packet::{Packet, PacketCreator, Timestamp};
use std::sync::Arc;

pub const DETECTION_STREAM: &str = "detection";
pub const DETECTIONS_STREAM: &str = "detections";

/// Feeds three class scores per frame. Every fourth frame nothing passes
/// the default threshold.
#[derive(Debug, Default)]
pub struct DetectionApp {
    best: Vec<Detection>,
    batches: Vec<Vec<Detection>>,
}

impl DetectionApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(frame: u32) -> Vec<f32> {
        if frame % 4 == 3 {
            return vec![0.1, 0.2, 0.3];
        }
        let step = (frame % 4) as f32 * 0.1;
        vec![0.9 - step, 0.4 + step, 0.55]
    }

    pub fn best(&self) -> &[Detection] {
        &self.best
    }

    pub fn batches(&self) -> &[Vec<Detection>] {
        &self.batches
    }
}

impl HostApp for DetectionApp {
    fn name(&self) -> &str {
        "detection"
    }

    fn on_create(&mut self, ctx: &mut HostContext<'_>) -> Result<()> {
        // Empty packets never reach the consumer here; the decoder counts
        // and skips them.
        let sender = ctx.sender();
        let single = DecodingCallback::new(
            DETECTION_STREAM,
            MessageDecoder::<Detection>::new(),
            move |timestamp, detection: Detection| {
                tracing::debug!("Detection is {:?}", detection);
                sender.send(HostMessage::Detections {
                    stream: DETECTION_STREAM.to_string(),
                    timestamp,
                    detections: vec![detection],
                });
            },
        );
        ctx.add_packet_callback(DETECTION_STREAM, Arc::new(single))?;

        let sender = ctx.sender();
        let batch = DecodingCallback::new(
            DETECTIONS_STREAM,
            MessageVecDecoder::<Detection>::new(),
            move |timestamp, detections: Vec<Detection>| {
                tracing::debug!("Detections is {:?}", detections);
                sender.send(HostMessage::Detections {
                    stream: DETECTIONS_STREAM.to_string(),
                    timestamp,
                    detections,
                });
            },
        );
        ctx.add_packet_callback(DETECTIONS_STREAM, Arc::new(batch))
    }

    fn input_packet(
        &self,
        creator: &PacketCreator,
        _stream: &str,
        frame: u32,
        timestamp: Timestamp,
    ) -> Option<Packet> {
        Some(creator.float32_vector_packet(Self::scores(frame), timestamp))
    }

    fn on_message(&mut self, message: HostMessage) {
        if let HostMessage::Detections {
            stream, detections, ..
        } = message
        {
            if stream == DETECTION_STREAM {
                self.best.extend(detections);
            } else {
                self.batches.push(detections);
            }
        }
    }
}
