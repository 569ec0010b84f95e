//! Booking Hub Server
//!
//! Run with: cargo run --bin booking-hub
//!
//! Configuration is read from `--config`, then the default locations
//! (see [`booking_hub::config::Config::discover`]), then environment
//! variables. `--host`/`--port` override everything.

use booking_hub::api::{serve, AppState};
use booking_hub::config::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "booking-hub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time event hub for the seat booking portals")]
struct Args {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, source) = Config::resolve(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    booking_hub::logging::init(&config.logging)?;

    tracing::info!("Starting booking hub v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded config file"),
        None => tracing::info!("No config file found, using defaults and environment"),
    }

    let api_config = config.server.to_api_config();
    let hub_config = config.hub.to_hub_config();
    tracing::info!(
        max_connections = hub_config.max_connections,
        heartbeat_timeout_secs = hub_config.heartbeat_timeout.as_secs(),
        sweep_interval_secs = hub_config.sweep_interval.as_secs(),
        "Hub configured"
    );

    let state = AppState::new(api_config.clone(), hub_config);

    // Evict connections that stop sending heartbeats
    let sweeper = state.hub.start_heartbeat_sweeper();

    let result = serve(state, &api_config).await;

    sweeper.abort();
    result?;

    tracing::info!("Booking hub shutdown complete");
    Ok(())
}
