//! Packet payload types.

use crate::packet::timestamp::Timestamp;
use bytes::Bytes;
use std::fmt;

/// A serialized message together with the type name its producer declared.
#[derive(Clone, PartialEq, Eq)]
pub struct MessagePayload {
    /// Fully-qualified type name, e.g. `mediapipe.Detection`.
    pub type_name: String,
    /// Encoded message bytes.
    pub bytes: Bytes,
}

impl MessagePayload {
    pub fn new(type_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            type_name: type_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Encode a prost message under its declared full name.
    pub fn encode<M>(message: &M) -> Self
    where
        M: prost::Message + prost::Name,
    {
        Self {
            type_name: M::full_name(),
            bytes: Bytes::from(message.encode_to_vec()),
        }
    }
}

impl fmt::Debug for MessagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePayload")
            .field("type_name", &self.type_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Discriminant of a [`Payload`], used in error messages and contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Empty,
    Float32,
    Float32Vec,
    String,
    Raw,
    Message,
    MessageVec,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayloadKind::Empty => "empty",
            PayloadKind::Float32 => "float32",
            PayloadKind::Float32Vec => "float32[]",
            PayloadKind::String => "string",
            PayloadKind::Raw => "raw bytes",
            PayloadKind::Message => "message",
            PayloadKind::MessageVec => "message[]",
        };
        f.write_str(name)
    }
}

/// The value held by a packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// No value. Empty packets still travel and are still dispatched.
    #[default]
    Empty,
    Float32(f32),
    Float32Vec(Vec<f32>),
    String(String),
    /// Untyped bytes, e.g. a little-endian `f32` buffer read from a file.
    Raw(Bytes),
    Message(MessagePayload),
    MessageVec(Vec<MessagePayload>),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty => PayloadKind::Empty,
            Payload::Float32(_) => PayloadKind::Float32,
            Payload::Float32Vec(_) => PayloadKind::Float32Vec,
            Payload::String(_) => PayloadKind::String,
            Payload::Raw(_) => PayloadKind::Raw,
            Payload::Message(_) => PayloadKind::Message,
            Payload::MessageVec(_) => PayloadKind::MessageVec,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

/// A timestamped payload travelling on a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    payload: Payload,
    timestamp: Timestamp,
}

impl Packet {
    /// Create a packet with an unset timestamp. Use [`Packet::at`] to stamp it.
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Timestamp::UNSET,
        }
    }

    /// An empty packet at `timestamp`.
    pub fn empty_at(timestamp: Timestamp) -> Self {
        Self {
            payload: Payload::Empty,
            timestamp,
        }
    }

    /// Return this packet re-stamped at `timestamp`.
    #[must_use]
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    #[inline]
    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}

impl From<Payload> for Packet {
    fn from(payload: Payload) -> Self {
        Packet::new(payload)
    }
}
