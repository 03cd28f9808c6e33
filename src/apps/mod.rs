//! Built-in host apps and their default graphs.
//!
//! | App            | Side packets                                    | Callbacks                    |
//! |----------------|-------------------------------------------------|------------------------------|
//! | `label-map`    | `file_path0`, `file_path1`                      | label map paths              |
//! | `output-value` | `user_value_0`, `testsubgraph__user_value_0`    | `output_value` (trace only)  |
//! | `detection`    | none                                            | `detection`, `detections`    |

pub mod detection;
pub mod label_map;
pub mod output_value;

pub use detection::DetectionApp;
pub use label_map::LabelMapApp;
pub use output_value::OutputValueApp;

use crate::config::{AppKind, GraphConfig};
use crate::error::{Result, ResultExt};
use crate::host::HostApp;

const LABEL_MAP_GRAPH: &str = include_str!("../../graphs/label_map.toml");
const OUTPUT_VALUE_GRAPH: &str = include_str!("../../graphs/output_value.toml");
const DETECTION_GRAPH: &str = include_str!("../../graphs/detection.toml");

/// Instantiate the app for `kind`.
pub fn create(kind: AppKind) -> Box<dyn HostApp> {
    match kind {
        AppKind::LabelMap => Box::new(LabelMapApp::new()),
        AppKind::OutputValue => Box::new(OutputValueApp::new()),
        AppKind::Detection => Box::new(DetectionApp::new()),
    }
}

/// The graph an app runs when the host config names none.
pub fn builtin_graph(kind: AppKind) -> Result<GraphConfig> {
    let source = match kind {
        AppKind::LabelMap => LABEL_MAP_GRAPH,
        AppKind::OutputValue => OUTPUT_VALUE_GRAPH,
        AppKind::Detection => DETECTION_GRAPH,
    };
    GraphConfig::from_toml_str(source)
        .with_context(|| format!("Built-in graph for '{}' is invalid", kind))
}
