//! Output-stream callbacks: decoders, handlers, and the stream registry.

pub mod decoder;
pub mod handler;
pub mod registry;

pub use decoder::{
    Float32Decoder, Float32VectorDecoder, MessageDecoder, MessageVecDecoder, PacketDecoder,
    StringDecoder,
};
pub use handler::{DecodeStats, DecodingCallback, PacketCallback};
pub use registry::{CallbackRegistry, DispatchOutcome, StreamState, StreamStats};
