//! Test data builders for graphs and side-packet bundles

use graphlink::config::{GraphConfig, NodeConfig};
use graphlink::{SidePacketBundle, SidePacketBundleBuilder};

/// `in` → PassThrough → `out`, with `out` declared as a graph output.
pub fn pass_through_graph() -> GraphConfig {
    GraphConfig::new()
        .with_input_stream("in")
        .with_output_stream("out")
        .with_node(NodeConfig::new("PassThroughCalculator").input("in").output("out"))
}

/// Emits side packet `key` on stream `out` once before the first packet.
/// `subgraph` scopes the key as `<subgraph>__<key>`.
pub fn side_packet_echo_graph(key: &str, subgraph: Option<&str>) -> GraphConfig {
    let mut node = NodeConfig::new("SidePacketToStreamCalculator")
        .input_side_packet(key)
        .output("out");
    if let Some(subgraph) = subgraph {
        node = node.in_subgraph(subgraph);
    }
    GraphConfig::new()
        .with_input_stream("in")
        .with_output_stream("out")
        .with_node(node)
}

/// Copies side packet `key` to output side packet `echo`.
pub fn side_packet_output_graph(key: &str) -> GraphConfig {
    GraphConfig::new()
        .with_input_stream("in")
        .with_output_side_packet("echo")
        .with_node(
            NodeConfig::new("PassThroughCalculator")
                .input_side_packet(key)
                .output_side_packet("echo"),
        )
}

/// `scores` → ScoresToDetections → `detections` / `detection`.
pub fn detection_graph(min_score: f64) -> GraphConfig {
    GraphConfig::new()
        .with_input_stream("scores")
        .with_output_stream("detections")
        .with_output_stream("detection")
        .with_node(
            NodeConfig::new("ScoresToDetectionsCalculator")
                .input("SCORES:scores")
                .output("DETECTIONS:detections")
                .output("DETECTION:detection")
                .option("min_score", min_score),
        )
}

/// Bundle with the two label-map paths.
pub fn label_map_bundle() -> SidePacketBundle {
    SidePacketBundleBuilder::new()
        .with("file_path0", "labelmap0.txt")
        .with("file_path1", "labelmap1.txt")
        .finalize()
}
