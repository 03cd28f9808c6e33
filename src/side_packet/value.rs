//! Side-packet values.

use crate::packet::{MessagePayload, Payload};
use std::fmt;

/// The closed set of value types a host may hand to a graph before start.
#[derive(Debug, Clone, PartialEq)]
pub enum SidePacketValue {
    String(String),
    Float32(f32),
    Message(MessagePayload),
}

/// Discriminant of a [`SidePacketValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidePacketKind {
    String,
    Float32,
    Message,
}

impl fmt::Display for SidePacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidePacketKind::String => f.write_str("string"),
            SidePacketKind::Float32 => f.write_str("float32"),
            SidePacketKind::Message => f.write_str("message"),
        }
    }
}

impl SidePacketValue {
    pub fn kind(&self) -> SidePacketKind {
        match self {
            SidePacketValue::String(_) => SidePacketKind::String,
            SidePacketValue::Float32(_) => SidePacketKind::Float32,
            SidePacketValue::Message(_) => SidePacketKind::Message,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SidePacketValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SidePacketValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessagePayload> {
        match self {
            SidePacketValue::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The stream payload carrying the same value.
    pub fn to_payload(&self) -> Payload {
        match self {
            SidePacketValue::String(s) => Payload::String(s.clone()),
            SidePacketValue::Float32(v) => Payload::Float32(*v),
            SidePacketValue::Message(m) => Payload::Message(m.clone()),
        }
    }

    /// The side-packet value carried by a stream payload, if the payload has
    /// a side-packet representation.
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::String(s) => Some(SidePacketValue::String(s.clone())),
            Payload::Float32(v) => Some(SidePacketValue::Float32(*v)),
            Payload::Message(m) => Some(SidePacketValue::Message(m.clone())),
            _ => None,
        }
    }
}

impl From<&str> for SidePacketValue {
    fn from(s: &str) -> Self {
        SidePacketValue::String(s.to_string())
    }
}

impl From<String> for SidePacketValue {
    fn from(s: String) -> Self {
        SidePacketValue::String(s)
    }
}

impl From<f32> for SidePacketValue {
    fn from(v: f32) -> Self {
        SidePacketValue::Float32(v)
    }
}

impl From<MessagePayload> for SidePacketValue {
    fn from(m: MessagePayload) -> Self {
        SidePacketValue::Message(m)
    }
}
