//! ScoresToDetectionsCalculator: turns a float score vector into
//! detections.
//!
//! Score `i` is the confidence of label `i`. Labels come from the optional
//! `LABEL_MAP` side packet, a path to a text file with one label per line;
//! without it the label is the index. Scores below `min_score` (default
//! 0.5) are dropped and at most `max_results` detections are kept, highest
//! score first.
//!
//! `DETECTIONS` carries every kept detection, or an empty packet when none
//! passes. `DETECTION` carries the best one and is skipped when none passes.

use crate::formats::Detection;
use crate::graph::calculator::{CalculatorContext, NodeSpec};
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::port::PortDescriptor;
use crate::packet::{PacketCreator, PacketGetter};
use crate::side_packet::SidePacketKind;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("SCORES"),
    PortDescriptor::output("DETECTIONS").optional(),
    PortDescriptor::output("DETECTION").optional(),
    PortDescriptor::input_side_packet("LABEL_MAP", Some(SidePacketKind::String)).optional(),
];

const DEFAULT_MIN_SCORE: f32 = 0.5;

pub struct ScoresToDetectionsCalculator {
    min_score: f32,
    max_results: Option<usize>,
    detections_port: Option<usize>,
    detection_port: Option<usize>,
    labels: Vec<String>,
    creator: PacketCreator,
}

impl ScoresToDetectionsCalculator {
    pub const NAME: &'static str = "ScoresToDetectionsCalculator";

    pub fn new(spec: &NodeSpec) -> GraphResult<Self> {
        let detections_port = spec.outputs.port("DETECTIONS", 0);
        let detection_port = spec.outputs.port("DETECTION", 0);
        if detections_port.is_none() && detection_port.is_none() {
            return Err(spec.invalid("needs a DETECTIONS or DETECTION output"));
        }

        Ok(Self {
            min_score: spec
                .option_f64("min_score")
                .map(|v| v as f32)
                .unwrap_or(DEFAULT_MIN_SCORE),
            max_results: spec.option_usize("max_results"),
            detections_port,
            detection_port,
            labels: Vec::new(),
            creator: PacketCreator::new(),
        })
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn open(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        let Some(path) = ctx
            .side_packet_tagged("LABEL_MAP", 0)
            .and_then(|v| v.as_str())
        else {
            return Ok(());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::calculator(
                ctx.node_name(),
                format!("failed to read label map '{}': {}", path, e),
            )
        })?;
        self.labels = content.lines().map(|l| l.trim().to_string()).collect();
        tracing::debug!(
            "{}: loaded {} labels from '{}'",
            ctx.node_name(),
            self.labels.len(),
            path
        );
        Ok(())
    }

    fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    /// Detections for `scores`, best first.
    pub fn detect(&self, scores: &[f32]) -> Vec<Detection> {
        let mut kept: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| *score >= self.min_score)
            .collect();
        kept.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        if let Some(max) = self.max_results {
            kept.truncate(max);
        }
        kept.into_iter()
            .map(|(index, score)| Detection::labeled(self.label(index), index as i32, score))
            .collect()
    }

    pub fn process(&mut self, ctx: &mut CalculatorContext) -> GraphResult<()> {
        let Some(packet) = ctx.input_tagged("SCORES", 0) else {
            return Ok(());
        };
        if packet.is_empty() {
            return Ok(());
        }
        let scores = PacketGetter::get_float32_vector(packet)
            .map_err(|e| GraphError::calculator(ctx.node_name(), e.to_string()))?;

        let timestamp = ctx.timestamp();
        let detections = self.detect(&scores);

        if let Some(port) = self.detections_port {
            let packet = if detections.is_empty() {
                self.creator.empty_packet(timestamp)
            } else {
                self.creator.proto_vector_packet(&detections, timestamp)
            };
            ctx.output(port, packet)?;
        }
        if let (Some(port), Some(best)) = (self.detection_port, detections.first()) {
            ctx.output(port, self.creator.proto_packet(best, timestamp))?;
        }
        Ok(())
    }
}
