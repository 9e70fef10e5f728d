//! `etlmon-node`: a host-level observability agent.
//!
//! Drives the collector fleet (filesystem usage, path scanner, log
//! tailer, process sampler), a tumbling-window aggregator for
//! fast-sampled cpu/memory/disk metrics, and a small HTTP API -- all
//! backed by one embedded SQLite store.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use etlmon::config::NodeConfig;
use etlmon::server::Server;

/// `etlmon-node` CLI.
#[derive(Parser)]
#[command(name = "etlmon-node")]
#[command(about = "Host-level observability agent: collectors + tumbling-window aggregation")]
#[command(version)]
struct Cli {
    /// Path to the node's YAML configuration file.
    #[arg(short, long, env = "ETLMON_CONFIG")]
    config: String,

    /// Log level (trace/debug/info/warn/error); overridden by RUST_LOG.
    #[arg(long, env = "ETLMON_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit structured JSON logs instead of human-readable text.
    #[arg(long, env = "ETLMON_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "fatal startup failure");
        eprintln!("etlmon-node: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = NodeConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;

    tracing::info!(node = %config.node.node_name, config = %cli.config, "etlmon-node starting");

    let server = Server::new(config, cli.config.clone());
    server.run().await
}
