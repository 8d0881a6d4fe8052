//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured filter when set. Output is either
//! compact text or one JSON object per line.

use openlock_types::constants::{ENGINE_NAME, VERSION};
use openlock_types::{LockupError, Result, TelemetryConfig};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Install the global subscriber described by `config`.
///
/// # Errors
/// `Configuration` if the filter directive does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(false),
        )
    } else {
        Box::new(tracing_subscriber::fmt::layer().compact().with_target(false))
    };

    Registry::default()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| LockupError::Configuration(format!("tracing init failed: {e}")))?;

    tracing::info!(engine = ENGINE_NAME, version = VERSION, json = config.json, "tracing initialized");
    Ok(())
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.filter),
    }
    .map_err(|e| LockupError::Configuration(format!("bad log filter {:?}: {e}", config.filter)))
}
