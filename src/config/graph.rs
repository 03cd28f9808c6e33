//! Graph descriptions.
//!
//! A graph is described in TOML: the graph's own input and output streams,
//! the output side packets it exposes after a run, and a list of `[[node]]`
//! tables, each naming a calculator and its connections in
//! `TAG:INDEX:NAME` form. Files ending in `.json` hold the same structure as
//! JSON.
//!
//! ```toml
//! input_stream = ["in"]
//! output_stream = ["out"]
//!
//! [[node]]
//! calculator = "PassThroughCalculator"
//! input_stream = ["in"]
//! output_stream = ["out"]
//! ```
//!
//! Threading is set with `num_threads` for the default executor and
//! `[[executor]]` tables for named pools a node can pick with `executor`.
//! `input_stream_handler` picks when a node with several inputs runs, for
//! the whole graph or per node.

use crate::error::{GraphLinkError, Result};
use crate::graph::InputStreamHandler;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level graph description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Streams fed by the host through `add_packet_to_input_stream`.
    pub input_stream: Vec<String>,
    /// Streams whose packets are dispatched to callbacks.
    pub output_stream: Vec<String>,
    /// Side packets readable through `output_side_packet` after the run.
    pub output_side_packet: Vec<String>,
    /// Threads of the default executor. One runs calculators on the
    /// scheduler thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    /// Handler for nodes that do not pick one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_stream_handler: Option<InputStreamHandler>,
    #[serde(rename = "executor", skip_serializing_if = "Vec::is_empty")]
    pub executors: Vec<ExecutorConfig>,
    #[serde(rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

/// One `[[executor]]` entry: a named thread pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Empty or `"default"` resizes the default executor.
    pub name: String,
    pub num_threads: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            num_threads: 1,
        }
    }
}

impl ExecutorConfig {
    pub fn new(name: impl Into<String>, num_threads: usize) -> Self {
        Self {
            name: name.into(),
            num_threads,
        }
    }
}

/// One `[[node]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Optional display name; defaults to `<calculator>_<index>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub calculator: String,
    pub input_stream: Vec<String>,
    pub output_stream: Vec<String>,
    pub input_side_packet: Vec<String>,
    pub output_side_packet: Vec<String>,
    /// Subgraph this node was expanded from. Side packets it reads resolve
    /// as `<subgraph>__<name>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<String>,
    /// Executor this node runs on; the default one when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_stream_handler: Option<InputStreamHandler>,
    #[serde(skip_serializing_if = "toml::Table::is_empty")]
    pub options: toml::Table,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GraphLinkError::Config(format!("Failed to parse graph config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            GraphLinkError::Serialization(format!("Failed to serialize graph config: {}", e))
        })
    }

    /// Parse a graph description in JSON, same shape as the TOML form.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| GraphLinkError::Config(format!("Failed to parse graph config: {}", e)))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            GraphLinkError::Serialization(format!("Failed to serialize graph config: {}", e))
        })
    }

    /// Load a graph description. Files ending in `.json` are read as JSON,
    /// everything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphLinkError::Config(format!(
                "Failed to read graph config '{}': {}",
                path.display(),
                e
            ))
        })?;
        if is_json(path) {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphLinkError::Config(format!("Failed to create graph directory: {}", e))
            })?;
        }
        let content = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_toml_string()?
        };
        std::fs::write(path, content)
            .map_err(|e| GraphLinkError::Config(format!("Failed to write graph config: {}", e)))
    }

    #[must_use]
    pub fn with_input_stream(mut self, spec: impl Into<String>) -> Self {
        self.input_stream.push(spec.into());
        self
    }

    #[must_use]
    pub fn with_output_stream(mut self, spec: impl Into<String>) -> Self {
        self.output_stream.push(spec.into());
        self
    }

    #[must_use]
    pub fn with_output_side_packet(mut self, spec: impl Into<String>) -> Self {
        self.output_side_packet.push(spec.into());
        self
    }

    #[must_use]
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executors.push(executor);
        self
    }

    #[must_use]
    pub fn with_input_stream_handler(mut self, handler: InputStreamHandler) -> Self {
        self.input_stream_handler = Some(handler);
        self
    }
}

impl NodeConfig {
    pub fn new(calculator: impl Into<String>) -> Self {
        Self {
            calculator: calculator.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.calculator, index))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn input(mut self, spec: impl Into<String>) -> Self {
        self.input_stream.push(spec.into());
        self
    }

    #[must_use]
    pub fn output(mut self, spec: impl Into<String>) -> Self {
        self.output_stream.push(spec.into());
        self
    }

    #[must_use]
    pub fn input_side_packet(mut self, spec: impl Into<String>) -> Self {
        self.input_side_packet.push(spec.into());
        self
    }

    #[must_use]
    pub fn output_side_packet(mut self, spec: impl Into<String>) -> Self {
        self.output_side_packet.push(spec.into());
        self
    }

    #[must_use]
    pub fn in_subgraph(mut self, subgraph: impl Into<String>) -> Self {
        self.subgraph = Some(subgraph.into());
        self
    }

    #[must_use]
    pub fn on_executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = Some(executor.into());
        self
    }

    #[must_use]
    pub fn input_stream_handler(mut self, handler: InputStreamHandler) -> Self {
        self.input_stream_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
