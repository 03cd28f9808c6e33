//! Configuration module for graphlink
//!
//! Two kinds of files are read:
//! - **Host config** ([`HostConfig`], `host.toml`): which app to run, which
//!   graph to load, logging, extra side packets and engine settings.
//! - **Graph config** ([`GraphConfig`]): the node/stream description of a
//!   graph.
//!
//! # Host Config Location
//!
//! The host config is looked up in this order:
//! 1. A path given on the command line
//! 2. The `GRAPHLINK_CONFIG` environment variable
//! 3. The platform config directory:
//!    - **Linux**: `~/.config/graphlink/host.toml`
//!    - **macOS**: `~/Library/Application Support/graphlink/host.toml`
//!    - **Windows**: `%APPDATA%\graphlink\host.toml`
//!
//! When none exists the defaults are used.

pub mod graph;
pub mod settings;

pub use graph::{ExecutorConfig, GraphConfig, NodeConfig};
pub use settings::*;

use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "graphlink";

/// Host config filename
pub const HOST_CONFIG_FILE: &str = "host.toml";

/// Environment variable naming an explicit host config path
pub const CONFIG_ENV_VAR: &str = "GRAPHLINK_CONFIG";

/// Default log filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,graphlink=debug";

/// Get the application config directory path
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Where the host config is read from, if anywhere.
pub fn resolve_host_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    app_config_dir()
        .map(|dir| dir.join(HOST_CONFIG_FILE))
        .filter(|path| path.exists())
}
