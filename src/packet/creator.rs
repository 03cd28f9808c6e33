//! Host-side construction of side-packet values and stream packets.

use crate::packet::payload::{MessagePayload, Packet, Payload};
use crate::packet::timestamp::Timestamp;
use crate::side_packet::SidePacketValue;

/// Builds typed values for a graph. Obtained from
/// [`GraphHandle::packet_creator`](crate::graph::GraphHandle::packet_creator).
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCreator;

impl PacketCreator {
    pub fn new() -> Self {
        Self
    }

    // --- Side-packet values ---

    pub fn create_string(&self, value: impl Into<String>) -> SidePacketValue {
        SidePacketValue::String(value.into())
    }

    pub fn create_float32(&self, value: f32) -> SidePacketValue {
        SidePacketValue::Float32(value)
    }

    pub fn create_proto<M>(&self, message: &M) -> SidePacketValue
    where
        M: prost::Message + prost::Name,
    {
        SidePacketValue::Message(MessagePayload::encode(message))
    }

    // --- Stream packets ---

    pub fn float32_packet(&self, value: f32, timestamp: Timestamp) -> Packet {
        Packet::new(Payload::Float32(value)).at(timestamp)
    }

    pub fn float32_vector_packet(&self, values: Vec<f32>, timestamp: Timestamp) -> Packet {
        Packet::new(Payload::Float32Vec(values)).at(timestamp)
    }

    pub fn string_packet(&self, value: impl Into<String>, timestamp: Timestamp) -> Packet {
        Packet::new(Payload::String(value.into())).at(timestamp)
    }

    pub fn proto_packet<M>(&self, message: &M, timestamp: Timestamp) -> Packet
    where
        M: prost::Message + prost::Name,
    {
        Packet::new(Payload::Message(MessagePayload::encode(message))).at(timestamp)
    }

    pub fn proto_vector_packet<M>(&self, messages: &[M], timestamp: Timestamp) -> Packet
    where
        M: prost::Message + prost::Name,
    {
        let payloads = messages.iter().map(MessagePayload::encode).collect();
        Packet::new(Payload::MessageVec(payloads)).at(timestamp)
    }

    pub fn empty_packet(&self, timestamp: Timestamp) -> Packet {
        Packet::empty_at(timestamp)
    }
}
