//! RR12 Bridge - relays Impinj RFID tag reads to a RACE RESULT timing system.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rr12_bridge as app;

use app::bridge::Engine;
use app::config::AppConfig;

/// Protocol bridge between an RFID tag stream and an RR12 timing system.
#[derive(Parser)]
#[command(name = "rr12-bridge")]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Explicit config file path (overrides --dev)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    tracing::info!("RR12 Bridge starting...");

    // Determine config path based on mode
    let config_path = if let Some(path) = cli.config {
        path
    } else if cli.dev {
        tracing::info!("Dev mode: loading config from current directory");
        PathBuf::from("config.toml")
    } else {
        AppConfig::default_path()
    };
    tracing::info!("Config path: {:?}", config_path);

    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    tracing::info!(
        "Control listener {}:{}, tag stream {}:{}, protocol {}, box {}",
        config.control.listen_ip,
        config.control.listen_port,
        config.source.host,
        config.source.port,
        config.protocol.version,
        config.protocol.device_id
    );

    Engine::new(config).run().await?;
    Ok(())
}
