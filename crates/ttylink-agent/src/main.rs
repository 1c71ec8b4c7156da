//! ttylink Agent Daemon
//!
//! Runs on a device, keeps one outbound WebSocket connection to the relay
//! server and serves interactive login shells over it on server request.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttylink_core::{config, identity, setup, AgentConfig};

#[derive(Parser)]
#[command(name = "ttylink-agent")]
#[command(about = "ttylink agent - exposes local shells through a relay server")]
#[command(version)]
struct Args {
    /// Network interface whose MAC address becomes the device id
    #[arg(short = 'i', long)]
    ifname: Option<String>,

    /// Explicit device id, max 63 bytes (overrides the interface-derived id)
    #[arg(short = 'I', long)]
    id: Option<String>,

    /// Relay server host
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Relay server port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Reconnect automatically when the connection is lost
    #[arg(short = 'a', long)]
    auto_reconnect: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ttylink agent starting...");

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::default_config_dir().join("agent.toml"));

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            AgentConfig::default()
        })
    } else {
        AgentConfig::default()
    };

    // Apply command-line overrides
    if let Some(host) = args.host {
        config.host = Some(host);
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(id) = args.id {
        config.device_id = Some(id);
    }
    if let Some(ifname) = args.ifname {
        config.interface = Some(ifname);
    }
    if args.auto_reconnect {
        config.auto_reconnect = true;
    }

    // Fixed for the process lifetime
    let device_id = match identity::resolve_device_id(
        config.device_id.as_deref(),
        config.interface.as_deref(),
    ) {
        Ok(id) => id,
        Err(e) => return usage_error(e.to_string()),
    };

    if config.host.is_none() || config.port.is_none() {
        return usage_error("You must specify the server host and port".to_string());
    }

    // Spawning login shells needs root and a login binary
    setup::check_privilege()?;
    let login_program = match &config.login_program {
        Some(path) => {
            anyhow::ensure!(path.exists(), "Login program not found: {}", path.display());
            path.clone()
        }
        None => setup::find_login_program().context("Startup check failed")?,
    };

    tracing::info!("Device id: {}", device_id);

    ttylink_agent::run(config, device_id, login_program).await
}

/// Report a startup error with usage text and a non-zero exit
fn usage_error(message: String) -> Result<()> {
    eprintln!("error: {}\n", message);
    Args::command().print_help().ok();
    std::process::exit(2);
}
