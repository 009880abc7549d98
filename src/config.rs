//! Runtime configuration from environment variables
//!
//! Loaded once at startup. Unparsable values fall back to their defaults with
//! a warning; values that cannot work at all are rejected.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::{env, str::FromStr, time::Duration};

pub const DEFAULT_EXPORT_PATH: &str = "sensor_stats_export.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Broker endpoint and consumption settings
#[derive(Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub queue: String,
    /// Full URI from `AMQP_ADDR`, used instead of the discrete fields
    pub uri_override: Option<String>,
    pub prefetch_count: u16,
    pub connect_timeout: Duration,
}

impl BrokerConfig {
    /// Connection URI with percent-encoded credentials and vhost
    pub fn amqp_uri(&self) -> String {
        if let Some(uri) = &self.uri_override {
            return uri.clone();
        }
        format!(
            "amqp://{}:{}@{}:{}/{}",
            utf8_percent_encode(&self.username, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.password, NON_ALPHANUMERIC),
            self.host,
            self.port,
            utf8_percent_encode(&self.vhost, NON_ALPHANUMERIC),
        )
    }

    /// Loggable endpoint, never includes credentials
    pub fn endpoint(&self) -> String {
        match &self.uri_override {
            Some(uri) => redact_uri(uri),
            None => format!("{}:{} (vhost {})", self.host, self.port, self.vhost),
        }
    }
}

// Password stays out of Debug output.
impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("endpoint", &self.endpoint())
            .field("username", &self.username)
            .field("queue", &self.queue)
            .field("prefetch_count", &self.prefetch_count)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}

/// Operator console settings
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub default_export_path: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub control: ControlConfig,
    pub window_size: usize,
    pub reconnect_delay: Duration,
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// Environment variables:
    /// - `RABBITMQ_HOST` (default: rabbitmq)
    /// - `RABBITMQ_PORT` (default: 5672)
    /// - `RABBITMQ_USER` / `RABBITMQ_PASS` (default: guest / guest)
    /// - `RABBITMQ_VHOST` (default: /)
    /// - `AMQP_QUEUE` (default: sensor_queue)
    /// - `AMQP_ADDR` (optional full URI, overrides the fields above)
    /// - `WINDOW_SIZE` (default: 10)
    /// - `RECONNECT_DELAY_SECS` (default: 10)
    /// - `CONNECT_TIMEOUT_SECS` (default: 10)
    /// - `PREFETCH_COUNT` (default: 10)
    /// - `CLI_POLL_INTERVAL_MS` (default: 1000)
    /// - `CLI_ENABLED` (default: true)
    /// - `EXPORT_DEFAULT_PATH` (default: sensor_stats_export.json)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let uri_override = lookup("AMQP_ADDR").filter(|s| !s.trim().is_empty());
        if let Some(uri) = &uri_override {
            if !uri.starts_with("amqp://") && !uri.starts_with("amqps://") {
                return Err(ConfigError::InvalidValue(
                    "AMQP_ADDR must start with amqp:// or amqps://".to_string(),
                ));
            }
        }

        let window_size: usize = parse_or(&lookup, "WINDOW_SIZE", 10);
        if window_size == 0 {
            return Err(ConfigError::InvalidValue(
                "WINDOW_SIZE must be at least 1".to_string(),
            ));
        }

        let prefetch_count: u16 = parse_or(&lookup, "PREFETCH_COUNT", 10);
        if prefetch_count == 0 {
            return Err(ConfigError::InvalidValue(
                "PREFETCH_COUNT must be at least 1".to_string(),
            ));
        }

        let queue = text("AMQP_QUEUE", "sensor_queue");
        if queue.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "AMQP_QUEUE cannot be empty".to_string(),
            ));
        }

        let broker = BrokerConfig {
            host: text("RABBITMQ_HOST", "rabbitmq"),
            port: parse_or(&lookup, "RABBITMQ_PORT", 5672),
            username: text("RABBITMQ_USER", "guest"),
            password: text("RABBITMQ_PASS", "guest"),
            vhost: text("RABBITMQ_VHOST", "/"),
            queue,
            uri_override,
            prefetch_count,
            connect_timeout: Duration::from_secs(parse_or(&lookup, "CONNECT_TIMEOUT_SECS", 10)),
        };

        let control = ControlConfig {
            enabled: parse_or(&lookup, "CLI_ENABLED", true),
            poll_interval: Duration::from_millis(parse_or(&lookup, "CLI_POLL_INTERVAL_MS", 1000)),
            default_export_path: text("EXPORT_DEFAULT_PATH", DEFAULT_EXPORT_PATH),
        };

        Ok(Self {
            broker,
            control,
            window_size,
            reconnect_delay: Duration::from_secs(parse_or(&lookup, "RECONNECT_DELAY_SECS", 10)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().to_lowercase().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', defaulting to {}", key, raw, default);
                default
            }
        },
    }
}
