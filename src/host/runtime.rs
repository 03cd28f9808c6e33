//! Host lifecycle driver.

use crate::config::{ConfiguredSidePacket, GraphConfig, HostConfig};
use crate::error::{Result, ResultExt};
use crate::graph::{CalculatorFactory, GraphHandle, PacketGraph};
use crate::host::{HostApp, HostBridge, HostContext, HostSender};
use crate::packet::Timestamp;
use crate::side_packet::{SidePacketBundleBuilder, SidePacketValue};
use std::collections::BTreeMap;

/// Summary of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub frames: u32,
    pub packets_sent: u64,
    /// Bridge messages handed to the app.
    pub messages_delivered: u64,
    /// Bridge messages lost to a full channel.
    pub dropped_messages: u64,
    /// Packets on streams without a callback.
    pub unregistered_drops: u64,
    pub output_side_packets: BTreeMap<String, SidePacketValue>,
}

/// Runs a [`HostApp`] against a [`PacketGraph`].
pub struct HostRuntime {
    config: HostConfig,
    factory: CalculatorFactory,
}

impl HostRuntime {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            factory: CalculatorFactory::new(),
        }
    }

    /// Use `factory` instead of the built-in calculators only.
    #[must_use]
    pub fn with_factory(mut self, factory: CalculatorFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Call `app.on_create` against an initialized, not yet started graph.
    ///
    /// When the app submits no side packets but the host config has some,
    /// they are submitted on their own.
    pub fn create_app(
        app: &mut dyn HostApp,
        graph: &mut dyn GraphHandle,
        sender: HostSender,
        configured: &BTreeMap<String, ConfiguredSidePacket>,
    ) -> Result<()> {
        let name = app.name().to_string();
        tracing::info!("Creating host app '{}'", name);

        let mut ctx = HostContext::new(graph, sender, configured);
        app.on_create(&mut ctx)
            .with_context(|| format!("Host app '{}' failed to create", name))?;
        if !ctx.side_packets_submitted() && !configured.is_empty() {
            ctx.set_input_side_packets(SidePacketBundleBuilder::new())?;
        }
        Ok(())
    }

    /// Initialize the graph, create the app, start the run, feed the demo
    /// frames and wait for the graph to finish.
    pub fn run(&self, app: &mut dyn HostApp, graph_config: &GraphConfig) -> Result<RunReport> {
        let mut graph = PacketGraph::new(self.factory.clone())
            .with_input_capacity(self.config.engine.input_channel_capacity);
        graph
            .initialize(graph_config)
            .context("Failed to initialize graph")?;

        let bridge = HostBridge::new(self.config.engine.host_channel_capacity);
        Self::create_app(app, &mut graph, bridge.sender(), &self.config.side_packets)?;
        graph.start_run().context("Failed to start graph")?;

        let mut report = RunReport::default();
        let creator = graph.packet_creator();
        let inputs: Vec<String> = graph
            .input_stream_names()
            .into_iter()
            .map(String::from)
            .collect();
        let interval = self.config.demo.interval_us.max(1);

        for frame in 0..self.config.demo.frames {
            let timestamp = Timestamp::new(i64::from(frame) * interval);
            for stream in &inputs {
                if let Some(packet) = app.input_packet(&creator, stream, frame, timestamp) {
                    graph
                        .add_packet_to_input_stream(stream, packet)
                        .with_context(|| format!("Failed to add frame {} to '{}'", frame, stream))?;
                    report.packets_sent += 1;
                }
            }
            report.frames += 1;
            deliver(app, &bridge, &mut report);
        }

        graph
            .close_all_input_streams()
            .context("Failed to close input streams")?;
        graph.wait_until_done().context("Graph run failed")?;
        deliver(app, &bridge, &mut report);

        for name in graph.declared_output_side_packets() {
            match graph.output_side_packet(name) {
                Ok(value) => {
                    tracing::info!("Output side packet '{}' = {:?}", name, value);
                    report.output_side_packets.insert(name.clone(), value);
                }
                Err(e) => tracing::warn!("Output side packet '{}' unavailable: {}", name, e),
            }
        }

        report.dropped_messages = bridge.dropped();
        report.unregistered_drops = graph.registry().unregistered_drops();
        tracing::info!(
            "Run finished: {} frames, {} packets, {} messages",
            report.frames,
            report.packets_sent,
            report.messages_delivered
        );
        Ok(report)
    }
}

fn deliver(app: &mut dyn HostApp, bridge: &HostBridge, report: &mut RunReport) {
    for message in bridge.drain() {
        report.messages_delivered += 1;
        app.on_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphError, MockGraphHandle};
    use crate::packet::{Packet, PacketCreator};
    use crate::side_packet::SidePacketBundle;
    use mockall::{predicate, Sequence};
    use std::sync::Arc;

    /// Puts one side packet and registers one callback.
    struct OneCallbackApp;

    impl HostApp for OneCallbackApp {
        fn name(&self) -> &str {
            "one-callback"
        }

        fn on_create(&mut self, ctx: &mut HostContext<'_>) -> Result<()> {
            let creator = ctx.packet_creator();
            let builder = SidePacketBundleBuilder::new()
                .with("file_path0", creator.create_string("labelmap0.txt"))
                .with("user_value_0", creator.create_float32(1.0));
            ctx.set_input_side_packets(builder)?;
            ctx.add_packet_callback("out", Arc::new(|_: &Packet| {}))
        }
    }

    struct SilentApp;

    impl HostApp for SilentApp {
        fn name(&self) -> &str {
            "silent"
        }

        fn on_create(&mut self, _ctx: &mut HostContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn mock_graph() -> MockGraphHandle {
        let mut graph = MockGraphHandle::new();
        graph.expect_packet_creator().returning(PacketCreator::new);
        graph
    }

    #[test]
    fn test_side_packets_submitted_before_callbacks() {
        let mut graph = mock_graph();
        let mut seq = Sequence::new();
        graph
            .expect_set_input_side_packets()
            .withf(|bundle: &SidePacketBundle| {
                bundle.len() == 2
                    && bundle.get("file_path0").and_then(|v| v.as_str()) == Some("labelmap0.txt")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        graph
            .expect_add_packet_callback()
            .with(predicate::eq("out"), predicate::always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let bridge = HostBridge::default();
        HostRuntime::create_app(&mut OneCallbackApp, &mut graph, bridge.sender(), &BTreeMap::new())
            .unwrap();
    }

    #[test]
    fn test_configured_side_packets_override() {
        let mut graph = mock_graph();
        graph
            .expect_set_input_side_packets()
            .withf(|bundle: &SidePacketBundle| {
                bundle.get("user_value_0").and_then(|v| v.as_f32()) == Some(-4.4)
            })
            .times(1)
            .returning(|_| Ok(()));
        graph.expect_add_packet_callback().returning(|_, _| Ok(()));

        let configured = BTreeMap::from([(
            "user_value_0".to_string(),
            ConfiguredSidePacket::Number(-4.4),
        )]);
        let bridge = HostBridge::default();
        HostRuntime::create_app(&mut OneCallbackApp, &mut graph, bridge.sender(), &configured).unwrap();
    }

    #[test]
    fn test_configured_side_packets_submitted_without_app() {
        let mut graph = mock_graph();
        graph
            .expect_set_input_side_packets()
            .withf(|bundle: &SidePacketBundle| bundle.contains_key("extra"))
            .times(1)
            .returning(|_| Ok(()));

        let configured = BTreeMap::from([(
            "extra".to_string(),
            ConfiguredSidePacket::Text("x".into()),
        )]);
        let bridge = HostBridge::default();
        HostRuntime::create_app(&mut SilentApp, &mut graph, bridge.sender(), &configured)
            .unwrap();
    }

    #[test]
    fn test_rejected_side_packets_fail_create() {
        let mut graph = mock_graph();
        graph
            .expect_set_input_side_packets()
            .times(1)
            .returning(|_| Err(GraphError::AlreadyStarted));
        graph.expect_add_packet_callback().never();

        let bridge = HostBridge::default();
        let err = HostRuntime::create_app(&mut OneCallbackApp, &mut graph, bridge.sender(), &BTreeMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("one-callback"));
    }
}
