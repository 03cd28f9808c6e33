//! Typed accessors for packet payloads.
//!
//! Every accessor reports one of three distinct failure kinds: the packet
//! was empty, the payload had a different type, or the payload bytes were
//! malformed. "No callback registered for the stream" is not a decode
//! failure and never reaches this module.

use crate::packet::payload::{MessagePayload, Packet, Payload, PayloadKind};
use thiserror::Error;

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Errors raised while reading a typed value out of a packet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("packet is empty, expected {expected}")]
    Empty { expected: PayloadKind },

    #[error("payload type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: PayloadKind,
        actual: PayloadKind,
    },

    #[error("message type mismatch: expected {expected}, got {actual}")]
    TypeNameMismatch { expected: String, actual: String },

    #[error("malformed {type_name} payload: {source}")]
    MalformedMessage {
        type_name: String,
        #[source]
        source: prost::DecodeError,
    },

    #[error("malformed float32 buffer: {len} bytes is not a multiple of 4")]
    MalformedFloatBuffer { len: usize },
}

impl DecodeError {
    /// Whether the payload bytes themselves were bad.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedMessage { .. } | DecodeError::MalformedFloatBuffer { .. }
        )
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DecodeError::Empty { .. })
    }

    fn mismatch(expected: PayloadKind, packet: &Packet) -> Self {
        if packet.is_empty() {
            DecodeError::Empty { expected }
        } else {
            DecodeError::TypeMismatch {
                expected,
                actual: packet.kind(),
            }
        }
    }
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Static accessors mirroring the payload variants.
pub struct PacketGetter;

impl PacketGetter {
    /// A single float. Accepts a scalar, a one-element vector, or a 4-byte
    /// raw buffer.
    pub fn get_float32(packet: &Packet) -> DecodeResult<f32> {
        match packet.payload() {
            Payload::Float32(v) => Ok(*v),
            Payload::Float32Vec(values) if values.len() == 1 => Ok(values[0]),
            Payload::Raw(bytes) if bytes.len() == F32_SIZE => {
                Ok(decode_f32_le(bytes)?[0])
            }
            _ => Err(DecodeError::mismatch(PayloadKind::Float32, packet)),
        }
    }

    /// A sequence of floats, in producer order. A scalar payload reads as a
    /// sequence of length one; raw bytes are read as little-endian `f32`s.
    pub fn get_float32_vector(packet: &Packet) -> DecodeResult<Vec<f32>> {
        match packet.payload() {
            Payload::Float32(v) => Ok(vec![*v]),
            Payload::Float32Vec(values) => Ok(values.clone()),
            Payload::Raw(bytes) => decode_f32_le(bytes),
            _ => Err(DecodeError::mismatch(PayloadKind::Float32Vec, packet)),
        }
    }

    pub fn get_string(packet: &Packet) -> DecodeResult<String> {
        match packet.payload() {
            Payload::String(s) => Ok(s.clone()),
            _ => Err(DecodeError::mismatch(PayloadKind::String, packet)),
        }
    }

    /// A single message of schema `M`.
    pub fn get_proto<M>(packet: &Packet) -> DecodeResult<M>
    where
        M: prost::Message + prost::Name + Default,
    {
        match packet.payload() {
            Payload::Message(message) => decode_message(message),
            _ => Err(DecodeError::mismatch(PayloadKind::Message, packet)),
        }
    }

    /// A sequence of messages of schema `M`. An empty packet reads as an
    /// empty sequence.
    pub fn get_proto_vector<M>(packet: &Packet) -> DecodeResult<Vec<M>>
    where
        M: prost::Message + prost::Name + Default,
    {
        match packet.payload() {
            Payload::Empty => Ok(Vec::new()),
            Payload::MessageVec(messages) => messages.iter().map(decode_message).collect(),
            _ => Err(DecodeError::mismatch(PayloadKind::MessageVec, packet)),
        }
    }
}

fn decode_f32_le(bytes: &[u8]) -> DecodeResult<Vec<f32>> {
    if bytes.len() % F32_SIZE != 0 {
        return Err(DecodeError::MalformedFloatBuffer { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(F32_SIZE)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn decode_message<M>(message: &MessagePayload) -> DecodeResult<M>
where
    M: prost::Message + prost::Name + Default,
{
    let expected = M::full_name();
    if message.type_name != expected {
        return Err(DecodeError::TypeNameMismatch {
            expected,
            actual: message.type_name.clone(),
        });
    }
    M::decode(message.bytes.clone()).map_err(|source| DecodeError::MalformedMessage {
        type_name: expected,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Detection;
    use crate::packet::Timestamp;
    use bytes::Bytes;

    fn detection(label: &str, score: f32) -> Detection {
        Detection {
            label: vec![label.to_string()],
            score: vec![score],
            ..Default::default()
        }
    }

    #[test]
    fn test_float32_vector_from_variants() {
        let scalar = Packet::new(Payload::Float32(-4.4));
        assert_eq!(PacketGetter::get_float32_vector(&scalar).unwrap(), vec![-4.4]);

        let vector = Packet::new(Payload::Float32Vec(vec![1.0, 2.0, 3.0]));
        assert_eq!(
            PacketGetter::get_float32_vector(&vector).unwrap(),
            vec![1.0, 2.0, 3.0]
        );

        let mut raw = Vec::new();
        raw.extend_from_slice(&1.5f32.to_le_bytes());
        raw.extend_from_slice(&(-2.0f32).to_le_bytes());
        let raw = Packet::new(Payload::Raw(Bytes::from(raw)));
        assert_eq!(PacketGetter::get_float32_vector(&raw).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_float32_vector_malformed_buffer() {
        let pkt = Packet::new(Payload::Raw(Bytes::from_static(&[0, 1, 2])));
        let err = PacketGetter::get_float32_vector(&pkt).unwrap_err();
        assert_eq!(err, DecodeError::MalformedFloatBuffer { len: 3 });
        assert!(err.is_malformed());
    }

    #[test]
    fn test_float32_scalar() {
        let one = Packet::new(Payload::Float32Vec(vec![7.0]));
        assert_eq!(PacketGetter::get_float32(&one).unwrap(), 7.0);

        let two = Packet::new(Payload::Float32Vec(vec![7.0, 8.0]));
        assert!(matches!(
            PacketGetter::get_float32(&two),
            Err(DecodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_and_mismatch_are_distinct() {
        let empty = Packet::empty_at(Timestamp::new(0));
        let err = PacketGetter::get_float32_vector(&empty).unwrap_err();
        assert!(err.is_empty());
        assert!(!err.is_malformed());

        let text = Packet::new(Payload::String("hello".into()));
        let err = PacketGetter::get_float32_vector(&text).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TypeMismatch {
                expected: PayloadKind::Float32Vec,
                actual: PayloadKind::String,
            }
        );
    }

    #[test]
    fn test_proto_round_trip() {
        let pkt = Packet::new(Payload::Message(MessagePayload::encode(&detection("cat", 0.9))));
        let decoded: Detection = PacketGetter::get_proto(&pkt).unwrap();
        assert_eq!(decoded.label, vec!["cat".to_string()]);
    }

    #[test]
    fn test_proto_malformed_bytes() {
        let pkt = Packet::new(Payload::Message(MessagePayload::new(
            "mediapipe.Detection",
            vec![0xFFu8, 0xFF, 0xFF],
        )));
        let err = PacketGetter::get_proto::<Detection>(&pkt).unwrap_err();
        assert!(err.is_malformed(), "got {:?}", err);
    }

    #[test]
    fn test_proto_type_name_mismatch() {
        let pkt = Packet::new(Payload::Message(MessagePayload::new("other.Type", Vec::new())));
        let err = PacketGetter::get_proto::<Detection>(&pkt).unwrap_err();
        assert!(matches!(err, DecodeError::TypeNameMismatch { .. }));
    }

    #[test]
    fn test_proto_vector_empty_packet_is_empty_vec() {
        let pkt = Packet::empty_at(Timestamp::new(1));
        let decoded: Vec<Detection> = PacketGetter::get_proto_vector(&pkt).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_proto_vector_preserves_order() {
        let payloads = vec![
            MessagePayload::encode(&detection("a", 0.1)),
            MessagePayload::encode(&detection("b", 0.2)),
        ];
        let pkt = Packet::new(Payload::MessageVec(payloads));
        let decoded: Vec<Detection> = PacketGetter::get_proto_vector(&pkt).unwrap();
        let labels: Vec<_> = decoded.iter().map(|d| d.label[0].as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[test]
    fn test_proto_empty_single_message() {
        let pkt = Packet::empty_at(Timestamp::new(1));
        let err = PacketGetter::get_proto::<Detection>(&pkt).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Empty {
                expected: PayloadKind::Message
            }
        );
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_float_vector_preserves_length_and_order(
            values in prop::collection::vec(-1.0e6f32..1.0e6, 0..64)
        ) {
            let pkt = Packet::new(Payload::Float32Vec(values.clone()));
            let decoded = PacketGetter::get_float32_vector(&pkt).unwrap();
            prop_assert_eq!(decoded.len(), values.len());
            prop_assert_eq!(decoded, values.clone());

            let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            let pkt = Packet::new(Payload::Raw(Bytes::from(raw)));
            prop_assert_eq!(PacketGetter::get_float32_vector(&pkt).unwrap(), values);
        }
    }
}
