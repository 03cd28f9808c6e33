//! Host apps against a mocked graph handle and against the real engine

mod common;

use common::mock_helpers::mock_graph;
use graphlink::apps::{self, DetectionApp, LabelMapApp, OutputValueApp};
use graphlink::config::{AppKind, HostConfig};
use graphlink::host::{HostBridge, HostRuntime};
use graphlink::{SidePacketBundle, SidePacketValue};
use mockall::Sequence;
use std::collections::BTreeMap;

#[test]
fn test_label_map_side_packets_submitted_once_before_callbacks() {
    let mut graph = mock_graph();
    let mut seq = Sequence::new();
    graph
        .expect_set_input_side_packets()
        .withf(|bundle: &SidePacketBundle| {
            bundle.len() == 2
                && bundle.get("file_path0").and_then(|v| v.as_str()) == Some("labelmap0.txt")
                && bundle.get("file_path1").and_then(|v| v.as_str()) == Some("labelmap1.txt")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    graph
        .expect_add_packet_callback()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let bridge = HostBridge::default();
    let mut app = LabelMapApp::new();
    HostRuntime::create_app(&mut app, &mut graph, bridge.sender(), &BTreeMap::new()).unwrap();
}

#[test]
fn test_output_value_side_packets() {
    let mut graph = mock_graph();
    graph
        .expect_set_input_side_packets()
        .withf(|bundle: &SidePacketBundle| {
            bundle.get("user_value_0") == Some(&SidePacketValue::Float32(-4.4))
                && bundle
                    .get("testsubgraph__user_value_0")
                    .and_then(|v| v.as_str())
                    == Some("Input Side Packet...")
        })
        .times(1)
        .returning(|_| Ok(()));
    graph.expect_add_packet_callback().returning(|_, _| Ok(()));

    let bridge = HostBridge::default();
    let mut app = OutputValueApp::new();
    HostRuntime::create_app(&mut app, &mut graph, bridge.sender(), &BTreeMap::new()).unwrap();
}

#[test]
fn test_detection_registers_both_streams() {
    let mut graph = mock_graph();
    graph.expect_set_input_side_packets().never();
    graph
        .expect_add_packet_callback()
        .withf(|stream: &str, _| stream == "detection" || stream == "detections")
        .times(2)
        .returning(|_, _| Ok(()));

    let bridge = HostBridge::default();
    let mut app = DetectionApp::new();
    HostRuntime::create_app(&mut app, &mut graph, bridge.sender(), &BTreeMap::new()).unwrap();
}

fn demo_config(app: AppKind, frames: u32) -> HostConfig {
    let mut config = HostConfig {
        app,
        ..Default::default()
    };
    config.demo.frames = frames;
    config
}

#[test]
fn test_label_map_app_run() {
    let config = demo_config(AppKind::LabelMap, 3);
    let graph = apps::builtin_graph(AppKind::LabelMap).unwrap();
    let mut app = LabelMapApp::new();
    let report = HostRuntime::new(config).run(&mut app, &graph).unwrap();

    assert_eq!(report.frames, 3);
    assert_eq!(report.packets_sent, 3);
    assert_eq!(app.paths(), ["labelmap0.txt", "labelmap1.txt"]);
    // output_frame has no callback.
    assert_eq!(report.unregistered_drops, 3);
}

#[test]
fn test_output_value_app_run_with_trace_logging() {
    let frames = 4;
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();

    let (report, values) = tracing::subscriber::with_default(subscriber, || {
        assert!(OutputValueApp::verbose());
        let config = demo_config(AppKind::OutputValue, frames);
        let graph = apps::builtin_graph(AppKind::OutputValue).unwrap();
        let mut app = OutputValueApp::new();
        let report = HostRuntime::new(config).run(&mut app, &graph).unwrap();
        (report, app.values().to_vec())
    });

    assert_eq!(
        report.output_side_packets.get("user_value_echo"),
        Some(&SidePacketValue::Float32(-4.4))
    );
    assert_eq!(values, vec![vec![-4.4f32]; frames as usize]);
}

#[test]
fn test_output_value_app_run_without_trace_logging() {
    // No subscriber is installed, so the output_value callback stays off.
    assert!(!OutputValueApp::verbose());
    let config = demo_config(AppKind::OutputValue, 4);
    let graph = apps::builtin_graph(AppKind::OutputValue).unwrap();
    let mut app = OutputValueApp::new();
    let report = HostRuntime::new(config).run(&mut app, &graph).unwrap();

    assert_eq!(
        report.output_side_packets.get("user_value_echo"),
        Some(&SidePacketValue::Float32(-4.4))
    );
    assert!(app.values().is_empty());
    // output_value has no callback, so every frame's packet is dropped.
    assert_eq!(report.unregistered_drops, 4);
}

#[test]
fn test_detection_app_run() {
    let config = demo_config(AppKind::Detection, 4);
    let graph = apps::builtin_graph(AppKind::Detection).unwrap();
    let mut app = DetectionApp::new();
    let report = HostRuntime::new(config).run(&mut app, &graph).unwrap();

    assert_eq!(report.dropped_messages, 0);
    assert_eq!(app.batches().len(), 4);
    // Frame 3 has no score above the threshold.
    assert!(app.batches()[3].is_empty());
    assert_eq!(app.best().len(), 3);
    assert!(app.batches()[..3].iter().all(|b| !b.is_empty()));
}

#[test]
fn test_configured_side_packet_overrides_app() {
    let mut config = demo_config(AppKind::OutputValue, 1);
    config.side_packets.insert(
        "user_value_0".to_string(),
        graphlink::config::ConfiguredSidePacket::Number(2.5),
    );
    let graph = apps::builtin_graph(AppKind::OutputValue).unwrap();
    let mut app = OutputValueApp::new();
    let report = HostRuntime::new(config).run(&mut app, &graph).unwrap();
    assert_eq!(
        report.output_side_packets.get("user_value_echo"),
        Some(&SidePacketValue::Float32(2.5))
    );
}
