//! Logging setup for the gateway binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the process entry point.

use crate::error::{FederationError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive such as `debug` or `faas_federation=trace`.
    pub level: Option<String>,
    pub format: LogFormat,
}

/// Translate a logrus level name into a tracing level.
///
/// Anything else is treated as a filter directive and passed through.
pub fn level_directive(level: &str) -> &str {
    match level.trim().to_ascii_lowercase().as_str() {
        "panic" | "fatal" | "error" => "error",
        "warning" | "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => level.trim(),
    }
}

/// Build the event filter: configured level, then `RUST_LOG`, then `info`.
pub fn build_filter(config: &LogConfig) -> EnvFilter {
    config
        .level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level_directive(level)).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(build_filter(config));

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| FederationError::InvalidConfig(format!("logging: {}", e)))
}
