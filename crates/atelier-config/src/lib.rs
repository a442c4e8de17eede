#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod providers;

use std::time::Duration;

use atelier_core::{ProviderKind, RetryPolicy};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

pub use env::ExpandError;
pub use providers::{ProviderConfig, ProvidersConfig};

/// Top-level Atelier configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider selection and output marking
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Retry policy shared by all providers
    #[serde(default)]
    pub retry: RetryConfig,
    /// Provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Remote store for user-supplied keys
    #[serde(default)]
    pub key_store: Option<KeyStoreConfig>,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Which provider the bundled default key belongs to
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Provider used on the Default key source
    #[serde(default = "default_provider")]
    pub default_provider: ProviderKind,
    /// Marker text applied to output made with the bundled key
    #[serde(default = "default_usage_marker")]
    pub usage_marker: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            usage_marker: default_usage_marker(),
        }
    }
}

const fn default_provider() -> ProviderKind {
    ProviderKind::Gemini
}

fn default_usage_marker() -> String {
    "Made with Atelier".to_owned()
}

/// Retry settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, doubled after each (e.g. "1500ms")
    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
        }
    }
}

const fn default_max_retries() -> u32 {
    atelier_core::retry::DEFAULT_MAX_RETRIES
}

fn default_initial_delay() -> String {
    "1500ms".to_owned()
}

impl RetryConfig {
    /// Build the runtime retry policy
    ///
    /// # Errors
    ///
    /// Returns an error if `initial_delay` is not a valid duration string
    pub fn policy(&self) -> anyhow::Result<RetryPolicy> {
        let initial_delay: Duration = duration_str::parse(&self.initial_delay)
            .map_err(|e| anyhow::anyhow!("invalid retry.initial_delay '{}': {e}", self.initial_delay))?;

        Ok(RetryPolicy::new(self.max_retries, initial_delay))
    }
}

/// Remote procedure endpoint storing encrypted per-user keys
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyStoreConfig {
    /// Base URL of the REST endpoint; procedures live under `rpc/`
    pub url: Url,
    /// Project key sent with every call
    pub api_key: SecretString,
}

/// Log output configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Filter directive; overridden by `--log` / `ATELIER_LOG`
    #[serde(default)]
    pub filter: Option<String>,
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    #[default]
    Compact,
    /// Newline-delimited JSON
    Json,
}
