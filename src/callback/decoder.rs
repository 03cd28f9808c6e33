//! Per-stream decoders.
//!
//! A decoder is handed over at registration time and fixes the schema a
//! stream is read with. Message decoders carry their schema as a type
//! parameter, so no process-wide type-name registry is needed.

use crate::packet::{DecodeResult, Packet, PacketGetter, PayloadKind};
use std::fmt;
use std::marker::PhantomData;

/// Reads one typed value out of a packet.
pub trait PacketDecoder: Send + Sync {
    type Output;

    /// The payload kind this decoder expects, for diagnostics.
    fn expected(&self) -> PayloadKind;

    fn decode(&self, packet: &Packet) -> DecodeResult<Self::Output>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Float32Decoder;

impl PacketDecoder for Float32Decoder {
    type Output = f32;

    fn expected(&self) -> PayloadKind {
        PayloadKind::Float32
    }

    fn decode(&self, packet: &Packet) -> DecodeResult<f32> {
        PacketGetter::get_float32(packet)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Float32VectorDecoder;

impl PacketDecoder for Float32VectorDecoder {
    type Output = Vec<f32>;

    fn expected(&self) -> PayloadKind {
        PayloadKind::Float32Vec
    }

    fn decode(&self, packet: &Packet) -> DecodeResult<Vec<f32>> {
        PacketGetter::get_float32_vector(packet)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl PacketDecoder for StringDecoder {
    type Output = String;

    fn expected(&self) -> PayloadKind {
        PayloadKind::String
    }

    fn decode(&self, packet: &Packet) -> DecodeResult<String> {
        PacketGetter::get_string(packet)
    }
}

/// Decodes a single message of schema `M`.
pub struct MessageDecoder<M> {
    _schema: PhantomData<fn() -> M>,
}

impl<M> MessageDecoder<M> {
    pub fn new() -> Self {
        Self {
            _schema: PhantomData,
        }
    }
}

impl<M> Default for MessageDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: prost::Name> fmt::Debug for MessageDecoder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageDecoder<{}>", M::full_name())
    }
}

impl<M> PacketDecoder for MessageDecoder<M>
where
    M: prost::Message + prost::Name + Default,
{
    type Output = M;

    fn expected(&self) -> PayloadKind {
        PayloadKind::Message
    }

    fn decode(&self, packet: &Packet) -> DecodeResult<M> {
        PacketGetter::get_proto(packet)
    }
}

/// Decodes a sequence of messages of schema `M`; empty packets decode to an
/// empty sequence.
pub struct MessageVecDecoder<M> {
    _schema: PhantomData<fn() -> M>,
}

impl<M> MessageVecDecoder<M> {
    pub fn new() -> Self {
        Self {
            _schema: PhantomData,
        }
    }
}

impl<M> Default for MessageVecDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: prost::Name> fmt::Debug for MessageVecDecoder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageVecDecoder<{}>", M::full_name())
    }
}

impl<M> PacketDecoder for MessageVecDecoder<M>
where
    M: prost::Message + prost::Name + Default,
{
    type Output = Vec<M>;

    fn expected(&self) -> PayloadKind {
        PayloadKind::MessageVec
    }

    fn decode(&self, packet: &Packet) -> DecodeResult<Vec<M>> {
        PacketGetter::get_proto_vector(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Detection;
    use crate::packet::{Payload, Timestamp};

    #[test]
    fn test_decoders_report_expected_kind() {
        assert_eq!(Float32VectorDecoder.expected(), PayloadKind::Float32Vec);
        assert_eq!(
            MessageVecDecoder::<Detection>::new().expected(),
            PayloadKind::MessageVec
        );
    }

    #[test]
    fn test_message_vec_decoder_on_empty_packet() {
        let decoder = MessageVecDecoder::<Detection>::new();
        let decoded = decoder.decode(&Packet::empty_at(Timestamp::new(0))).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_float_decoder_rejects_string() {
        let pkt = Packet::new(Payload::String("x".into()));
        assert!(Float32Decoder.decode(&pkt).is_err());
    }

    #[test]
    fn test_debug_names_schema() {
        let decoder = MessageDecoder::<Detection>::new();
        assert_eq!(format!("{:?}", decoder), "MessageDecoder<mediapipe.Detection>");
    }
}
