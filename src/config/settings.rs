//! Host settings
//!
//! [`HostConfig`] selects the host app and graph and carries everything the
//! binary needs around them: log filter, optional log directory, extra side
//! packets and engine channel sizes.
//!
//! ```toml
//! app = "output-value"
//! log_filter = "info,graphlink=trace"
//!
//! [side_packets]
//! user_value_0 = -4.4
//! testsubgraph__user_value_0 = "Input Side Packet from the host"
//!
//! [engine]
//! input_channel_capacity = 64
//! ```

use crate::config::{resolve_host_config_path, DEFAULT_LOG_FILTER};
use crate::error::{GraphLinkError, Result};
use crate::graph::DEFAULT_INPUT_CHANNEL_CAPACITY;
use crate::side_packet::SidePacketValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which host app to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    /// Label-map file paths as side packets.
    #[default]
    LabelMap,
    /// Numeric and subgraph side packets plus a float-vector callback.
    OutputValue,
    /// Detection callbacks on a scores graph.
    Detection,
}

impl AppKind {
    pub const ALL: [AppKind; 3] = [AppKind::LabelMap, AppKind::OutputValue, AppKind::Detection];

    pub fn as_str(self) -> &'static str {
        match self {
            AppKind::LabelMap => "label-map",
            AppKind::OutputValue => "output-value",
            AppKind::Detection => "detection",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side packet written in the host config. Strings stay strings, numbers
/// become 32-bit floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfiguredSidePacket {
    Text(String),
    Number(f64),
}

impl From<&ConfiguredSidePacket> for SidePacketValue {
    fn from(value: &ConfiguredSidePacket) -> Self {
        match value {
            ConfiguredSidePacket::Text(s) => SidePacketValue::String(s.clone()),
            ConfiguredSidePacket::Number(n) => SidePacketValue::Float32(*n as f32),
        }
    }
}

/// Engine channel sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Packets queued from the host to the scheduler before `add` blocks.
    pub input_channel_capacity: usize,
    /// Messages queued from callbacks to the host thread before they are
    /// dropped.
    pub host_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            input_channel_capacity: DEFAULT_INPUT_CHANNEL_CAPACITY,
            host_channel_capacity: 1024,
        }
    }
}

/// Synthetic input fed by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Number of input packets to feed.
    pub frames: u32,
    /// Timestamp step between packets, in microseconds.
    pub interval_us: i64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            frames: 10,
            interval_us: 33_333,
        }
    }
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub app: AppKind,
    /// Graph description to load; the app's built-in graph when unset.
    pub graph: Option<PathBuf>,
    pub log_filter: String,
    /// Also write logs to a daily-rotated file in this directory.
    pub log_dir: Option<PathBuf>,
    /// Extra side packets; they override the ones the app puts.
    pub side_packets: BTreeMap<String, ConfiguredSidePacket>,
    pub engine: EngineSettings,
    pub demo: DemoSettings,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app: AppKind::default(),
            graph: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
            side_packets: BTreeMap::new(),
            engine: EngineSettings::default(),
            demo: DemoSettings::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GraphLinkError::Config(format!("Failed to parse host config: {}", e)))
    }

    /// Load host config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphLinkError::Config(format!(
                "Failed to read host config '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml_str(&content)?;

        // A relative graph path is relative to the config file.
        if let (Some(graph), Some(dir)) = (&config.graph, path.parent()) {
            if graph.is_relative() {
                config.graph = Some(dir.join(graph));
            }
        }
        Ok(config)
    }

    /// Load from the resolved location, falling back to defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let Some(path) = resolve_host_config_path(explicit) else {
            tracing::debug!("No host config found, using defaults");
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load host config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save host config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraphLinkError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            GraphLinkError::Serialization(format!("Failed to serialize host config: {}", e))
        })?;

        std::fs::write(path, content)
            .map_err(|e| GraphLinkError::Config(format!("Failed to write host config: {}", e)))
    }
}
