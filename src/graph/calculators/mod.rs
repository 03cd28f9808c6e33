//! Built-in calculator implementations.

pub mod pass_through;
pub mod scores_to_detections;
pub mod side_packet_to_stream;

pub use pass_through::PassThroughCalculator;
pub use scores_to_detections::ScoresToDetectionsCalculator;
pub use side_packet_to_stream::{EmitAt, SidePacketToStreamCalculator};
