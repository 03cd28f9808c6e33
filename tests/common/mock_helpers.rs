//! Mock construction helpers

use graphlink::callback::PacketCallback;
use graphlink::graph::{GraphHandle, GraphResult};
use graphlink::{Packet, PacketCreator, SidePacketBundle};
use parking_lot::Mutex;
use std::sync::Arc;

mockall::mock! {
    pub Graph {}

    impl GraphHandle for Graph {
        fn packet_creator(&self) -> PacketCreator;
        fn set_input_side_packets(&mut self, bundle: SidePacketBundle) -> GraphResult<()>;
        fn add_packet_callback(
            &mut self,
            stream: &str,
            callback: Arc<dyn PacketCallback>,
        ) -> GraphResult<()>;
    }
}

/// A mock graph whose creator call always succeeds.
pub fn mock_graph() -> MockGraph {
    let mut graph = MockGraph::new();
    graph.expect_packet_creator().returning(PacketCreator::new);
    graph
}

/// Callback that keeps every packet it sees.
#[derive(Default)]
pub struct RecordingCallback {
    packets: Mutex<Vec<Packet>>,
}

impl RecordingCallback {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.packets.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }
}

impl PacketCallback for RecordingCallback {
    fn on_packet(&self, packet: &Packet) {
        self.packets.lock().push(packet.clone());
    }
}
