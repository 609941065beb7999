//! Gateway configuration.

use crate::error::{FederationError, Result};
use crate::runtime::logging::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the federation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Provider base URLs, in configuration order.
    pub providers: Vec<String>,
    /// Provider used when a function declares no usable affinity.
    pub default_provider: String,
    /// Timeout for reading request headers and for forwarded calls.
    pub read_timeout: Duration,
    /// Upper bound for producing a response.
    pub write_timeout: Duration,
    /// Timeout for each provider call made while listing functions.
    pub fetch_timeout: Duration,
    /// Interval between function list refreshes, `None` disables them.
    pub refresh_interval: Option<Duration>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Logging setup applied by the binary.
    pub log: LogConfig,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            providers: Vec::new(),
            default_provider: String::new(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
            refresh_interval: Some(Duration::from_secs(30)),
            max_body_size: 10 * 1024 * 1024, // 10MB
            log: LogConfig::default(),
        }
    }
}

impl FederationConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Add a provider base URL.
    pub fn provider(mut self, url: impl Into<String>) -> Self {
        self.providers.push(url.into());
        self
    }

    /// Set the default provider base URL.
    pub fn default_provider(mut self, url: impl Into<String>) -> Self {
        self.default_provider = url.into();
        self
    }

    /// Set the provider fetch timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set or disable the refresh interval.
    pub fn refresh_interval(mut self, every: Option<Duration>) -> Self {
        self.refresh_interval = every;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_map(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// Recognised variables: `PORT`, `PROVIDERS` (comma separated),
    /// `DEFAULT_PROVIDER`, `READ_TIMEOUT`, `WRITE_TIMEOUT`, `FETCH_TIMEOUT`,
    /// `REFRESH_INTERVAL` (seconds, `0` disables), `MAX_BODY_SIZE`,
    /// `LOG_LEVEL` and `LOG_FORMAT`.
    pub fn from_env_map<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            config.port = parse_number("PORT", &port)?;
        }

        config.providers = get("PROVIDERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        config.default_provider = get("DEFAULT_PROVIDER")
            .map(|v| v.trim().to_string())
            .ok_or_else(|| FederationError::InvalidConfig("DEFAULT_PROVIDER is required".into()))?;

        if let Some(v) = get("READ_TIMEOUT") {
            config.read_timeout = Duration::from_secs(parse_number("READ_TIMEOUT", &v)?);
        }
        if let Some(v) = get("WRITE_TIMEOUT") {
            config.write_timeout = Duration::from_secs(parse_number("WRITE_TIMEOUT", &v)?);
        }
        if let Some(v) = get("FETCH_TIMEOUT") {
            config.fetch_timeout = Duration::from_secs(parse_number("FETCH_TIMEOUT", &v)?);
        }
        if let Some(v) = get("REFRESH_INTERVAL") {
            let secs: u64 = parse_number("REFRESH_INTERVAL", &v)?;
            config.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = get("MAX_BODY_SIZE") {
            config.max_body_size = parse_number("MAX_BODY_SIZE", &v)?;
        }

        config.log.level = get("LOG_LEVEL");
        if let Some(format) = get("LOG_FORMAT") {
            config.log.format = LogFormat::from(format.as_str());
        }

        if config.providers.is_empty() {
            return Err(FederationError::InvalidConfig(
                "PROVIDERS must list at least one provider".into(),
            ));
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FederationError::InvalidConfig(format!("{} has invalid value {}", key, value)))
}
