//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::AppResult;

/// Maximum number of messages the Expo gateway accepts per send request.
pub const GATEWAY_MAX_SEND_BATCH: usize = 100;

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Push gateway configuration.
    #[serde(default)]
    #[validate(nested)]
    pub push: PushConfig,
    /// Notification rendering configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP ingress configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long shutdown waits for in-flight change events, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Pub/Sub channel carrying change events.
    #[serde(default = "default_changes_channel")]
    pub changes_channel: String,
}

/// Push gateway configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PushConfig {
    /// Endpoint accepting arrays of push messages.
    #[serde(default = "default_send_url")]
    #[validate(url)]
    pub send_url: String,
    /// Endpoint resolving ticket ids to receipts.
    #[serde(default = "default_receipts_url")]
    #[validate(url)]
    pub receipts_url: String,
    /// Optional bearer token for gateways with enhanced security enabled.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Messages per send request.
    #[serde(default = "default_send_batch_size")]
    #[validate(range(min = 1, max = 100))]
    pub send_batch_size: usize,
    /// Ticket ids per receipt lookup.
    #[serde(default = "default_receipt_batch_size")]
    #[validate(range(min = 1, max = 1000))]
    pub receipt_batch_size: usize,
    /// Gateway requests in flight at once within one invocation.
    #[serde(default = "default_max_concurrent_requests")]
    #[validate(range(min = 1))]
    pub max_concurrent_requests: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Wait before the first receipt lookup, in seconds.
    #[serde(default)]
    pub receipt_delay_secs: u64,
    /// Deadline for a whole invocation, in seconds. No deadline when unset.
    #[serde(default)]
    pub invocation_timeout_secs: Option<u64>,
}

/// Notification rendering configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Locale used when a recipient has no supported language preference.
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Scheme of the deep links placed in message payloads.
    #[serde(default = "default_deep_link_scheme")]
    pub deep_link_scheme: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_shutdown_grace_secs() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_changes_channel() -> String {
    "barrio:changes".to_string()
}

fn default_send_url() -> String {
    "https://exp.host/--/api/v2/push/send".to_string()
}

fn default_receipts_url() -> String {
    "https://exp.host/--/api/v2/push/getReceipts".to_string()
}

const fn default_send_batch_size() -> usize {
    GATEWAY_MAX_SEND_BATCH
}

const fn default_receipt_batch_size() -> usize {
    300
}

const fn default_max_concurrent_requests() -> usize {
    6
}

const fn default_request_timeout_secs() -> u64 {
    30
}

fn default_locale() -> String {
    "es".to_string()
}

fn default_deep_link_scheme() -> String {
    "app".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ServerConfig {
    /// Wait for in-flight change events at shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            send_url: default_send_url(),
            receipts_url: default_receipts_url(),
            access_token: None,
            send_batch_size: default_send_batch_size(),
            receipt_batch_size: default_receipt_batch_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
            receipt_delay_secs: 0,
            invocation_timeout_secs: None,
        }
    }
}

impl PushConfig {
    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Wait before the first receipt lookup.
    #[must_use]
    pub const fn receipt_delay(&self) -> Duration {
        Duration::from_secs(self.receipt_delay_secs)
    }

    /// Deadline for a whole invocation, if any.
    #[must_use]
    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            deep_link_scheme: default_deep_link_scheme(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `BARRIO_ENV`)
    /// 4. Environment variables with `BARRIO_` prefix
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let env = std::env::var("BARRIO_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BARRIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BARRIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Load configuration from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> AppResult<Self> {
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
