//! Tracing subscriber setup for the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("booking_hub={},tower_http=debug", config.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init()?,
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    Ok(())
}
