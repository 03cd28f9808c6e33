//! graphlink host - Main Entry Point
//!
//! Runs one of the built-in host apps against its graph and reports what
//! came out.

use anyhow::Context;
use clap::Parser;
use graphlink::{
    apps,
    config::{resolve_host_config_path, AppKind, ConfiguredSidePacket, GraphConfig, HostConfig},
    host::HostRuntime,
};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "graphlink")]
#[command(author, version, about = "Run a host app against a packet graph", long_about = None)]
struct Args {
    /// Host config file (defaults to $GRAPHLINK_CONFIG, then the platform config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Host app: label-map, output-value or detection
    #[arg(short, long, value_parser = parse_app)]
    app: Option<AppKind>,

    /// Graph description to run instead of the app's built-in graph
    #[arg(short, long, value_name = "PATH")]
    graph: Option<PathBuf>,

    /// Number of input frames to feed
    #[arg(long)]
    frames: Option<u32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long)]
    log_filter: Option<String>,

    /// Extra side packet as KEY=VALUE; numbers become floats (repeatable)
    #[arg(short = 's', long = "side-packet", value_name = "KEY=VALUE", value_parser = parse_side_packet)]
    side_packets: Vec<(String, ConfiguredSidePacket)>,

    /// Write the effective host config to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn parse_app(value: &str) -> Result<AppKind, String> {
    AppKind::parse(value).ok_or_else(|| {
        let known: Vec<&str> = AppKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown app '{}', expected one of {}", value, known.join(", "))
    })
}

fn parse_side_packet(value: &str) -> Result<(String, ConfiguredSidePacket), String> {
    let (key, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))?;
    if key.is_empty() {
        return Err("side packet key is empty".to_string());
    }
    let parsed = match raw.parse::<f64>() {
        Ok(number) => ConfiguredSidePacket::Number(number),
        Err(_) => ConfiguredSidePacket::Text(raw.to_string()),
    };
    Ok((key.to_string(), parsed))
}

fn init_logging(config: &HostConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("Invalid log filter")?;

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "graphlink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging depends on the config, so a load failure is reported once the
    // subscriber is up.
    let config_path = resolve_host_config_path(args.config.as_deref());
    let loaded = config_path.as_deref().map(HostConfig::load).transpose();
    let (mut config, load_error) = match loaded {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (HostConfig::default(), Some(e)),
    };

    if let Some(app) = args.app {
        config.app = app;
    }
    if let Some(graph) = args.graph {
        config.graph = Some(graph);
    }
    if let Some(frames) = args.frames {
        config.demo.frames = frames;
    }
    if let Some(filter) = args.log_filter {
        config.log_filter = filter;
    }
    config.side_packets.extend(args.side_packets);

    let _guard = init_logging(&config)?;
    if let Some(e) = load_error {
        tracing::warn!("Failed to load host config, using defaults: {}", e);
    } else if let Some(path) = &config_path {
        tracing::info!("Loaded host config from {}", path.display());
    }

    if let Some(path) = args.write_config {
        config
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote host config to {}", path.display());
        return Ok(());
    }

    tracing::info!("Starting graphlink host app '{}'", config.app);

    let graph_config = match &config.graph {
        Some(path) => GraphConfig::load(path)?,
        None => apps::builtin_graph(config.app)?,
    };

    let mut app = apps::create(config.app);
    let report = HostRuntime::new(config).run(app.as_mut(), &graph_config)?;

    tracing::info!(
        "Done: {} frames, {} packets in, {} messages out, {} dropped, {} unobserved",
        report.frames,
        report.packets_sent,
        report.messages_delivered,
        report.dropped_messages,
        report.unregistered_drops
    );
    for (name, value) in &report.output_side_packets {
        tracing::info!("  {} = {:?}", name, value);
    }
    Ok(())
}
