//! Host and graph config loading

mod common;

use graphlink::config::{
    resolve_host_config_path, AppKind, GraphConfig, HostConfig, NodeConfig, CONFIG_ENV_VAR,
};
use graphlink::PacketGraph;
use serial_test::serial;
use std::path::Path;
use tempfile::tempdir;

#[test]
#[serial]
fn test_env_var_selects_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("host.toml");
    std::fs::write(&path, "app = \"detection\"\n[demo]\nframes = 7\n").unwrap();

    std::env::set_var(CONFIG_ENV_VAR, &path);
    let resolved = resolve_host_config_path(None);
    let config = HostConfig::load_or_default(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(path.as_path()));
    assert_eq!(config.app, AppKind::Detection);
    assert_eq!(config.demo.frames, 7);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    let dir = tempdir().unwrap();
    let explicit = dir.path().join("explicit.toml");
    std::fs::write(&explicit, "app = \"output-value\"\n").unwrap();

    std::env::set_var(CONFIG_ENV_VAR, dir.path().join("other.toml"));
    let config = HostConfig::load_or_default(Some(&explicit));
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.app, AppKind::OutputValue);
}

#[test]
#[serial]
fn test_missing_env_file_falls_back_to_defaults() {
    std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/graphlink/host.toml");
    let config = HostConfig::load_or_default(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config, HostConfig::default());
}

#[test]
fn test_graph_config_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graphs").join("chain.toml");
    let config = GraphConfig::new()
        .with_input_stream("in")
        .with_output_stream("out")
        .with_node(
            NodeConfig::new("PassThroughCalculator")
                .named("first")
                .input("in")
                .output("mid"),
        )
        .with_node(NodeConfig::new("PassThroughCalculator").input("mid").output("out"));
    config.save(&path).unwrap();

    let loaded = GraphConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    let graph = PacketGraph::from_config(&loaded).unwrap();
    assert_eq!(
        graph.execution_order(),
        vec!["first", "PassThroughCalculator_1"]
    );
}

#[test]
fn test_shipped_graph_files_parse() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("graphs");
    for name in ["label_map.toml", "output_value.toml", "detection.toml"] {
        let config = GraphConfig::load(root.join(name)).unwrap();
        assert!(PacketGraph::from_config(&config).is_ok(), "{}", name);
    }
}

#[test]
fn test_invalid_graph_file_reports_path() {
    let dir = tempdir().unwrap();
    let err = GraphConfig::load(dir.path().join("missing.toml")).unwrap_err();
    assert!(err.to_string().contains("missing.toml"));
}
