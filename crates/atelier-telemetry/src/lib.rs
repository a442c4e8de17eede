//! Logging setup for Atelier
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a fmt
//! layer in the configured format.

use atelier_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither the command line nor the config sets one
pub const DEFAULT_FILTER: &str = "info";

/// Initialize logging
///
/// Logs go to stderr so command output on stdout stays clean.
/// `filter` takes precedence over the configured filter. An unparseable
/// filter falls back to `info` rather than failing startup.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig, filter: Option<&str>) -> anyhow::Result<()> {
    let directive = filter
        .or(config.filter.as_deref())
        .unwrap_or(DEFAULT_FILTER);

    let env_filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    tracing::debug!(filter = directive, format = ?config.log_format, "logging initialized");
    Ok(())
}
