//! Detection messages.
//!
//! Wire-compatible subset of `mediapipe.Detection`: one detection may carry
//! several label hypotheses, each with an id and a score at the same index.

/// A relative (0..1) axis-aligned bounding box.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RelativeBoundingBox {
    #[prost(float, tag = "1")]
    pub xmin: f32,
    #[prost(float, tag = "2")]
    pub ymin: f32,
    #[prost(float, tag = "3")]
    pub width: f32,
    #[prost(float, tag = "4")]
    pub height: f32,
}

/// Where a detection is located in its input.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LocationData {
    #[prost(message, optional, tag = "3")]
    pub relative_bounding_box: Option<RelativeBoundingBox>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Detection {
    #[prost(string, repeated, tag = "1")]
    pub label: Vec<String>,
    #[prost(int32, repeated, tag = "2")]
    pub label_id: Vec<i32>,
    #[prost(float, repeated, tag = "3")]
    pub score: Vec<f32>,
    #[prost(message, optional, tag = "4")]
    pub location_data: Option<LocationData>,
    #[prost(string, tag = "5")]
    pub feature_tag: String,
    #[prost(string, tag = "6")]
    pub track_id: String,
    #[prost(int64, tag = "7")]
    pub detection_id: i64,
}

impl prost::Name for Detection {
    const NAME: &'static str = "Detection";
    const PACKAGE: &'static str = "mediapipe";
}

impl prost::Name for LocationData {
    const NAME: &'static str = "LocationData";
    const PACKAGE: &'static str = "mediapipe";
}

impl Detection {
    /// Build a single-hypothesis detection.
    pub fn labeled(label: impl Into<String>, label_id: i32, score: f32) -> Self {
        Self {
            label: vec![label.into()],
            label_id: vec![label_id],
            score: vec![score],
            ..Default::default()
        }
    }

    /// The highest-scoring hypothesis as `(label, score)`.
    pub fn top_label(&self) -> Option<(&str, f32)> {
        self.score
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .and_then(|(i, score)| self.label.get(i).map(|label| (label.as_str(), *score)))
    }
}
