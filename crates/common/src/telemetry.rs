//! Tracing initialization for the econsql binaries.
//!
//! Log level comes from `RUST_LOG` (default `info` for the server, `warn` for
//! one-shot CLI commands). JSON output is opt-in through `telemetry.json_logs`.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::TelemetryConfig;

pub fn init_tracing(config: &TelemetryConfig) -> Result<()> {
    init_tracing_with_default(config, "info")
}

/// Same as [`init_tracing`], with `default_directive` used when `RUST_LOG` is unset.
pub fn init_tracing_with_default(config: &TelemetryConfig, default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!(service = %config.service_name, "tracing initialized");
    Ok(())
}
