//! Message schemas exchanged over graph streams.

pub mod detection;

pub use detection::{Detection, LocationData, RelativeBoundingBox};
