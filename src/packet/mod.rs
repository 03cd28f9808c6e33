//! Packets and typed payloads.
//!
//! A [`Packet`] is the unit that flows along a stream: one [`Payload`] plus a
//! [`Timestamp`]. Payloads are cheap to clone (message bytes are shared
//! [`bytes::Bytes`]) so a single output packet can fan out to a callback and
//! any number of pollers without copying.
//!
//! - [`PacketCreator`] builds side-packet values and packets on the host side.
//! - [`PacketGetter`] and the decoders in [`getter`] turn payloads back into
//!   typed values, reporting failures as [`DecodeError`].

pub mod creator;
pub mod getter;
pub mod payload;
pub mod timestamp;

pub use creator::PacketCreator;
pub use getter::{DecodeError, DecodeResult, PacketGetter};
pub use payload::{MessagePayload, Packet, Payload, PayloadKind};
pub use timestamp::Timestamp;
