//! Configuration for the sync manager and the HTTP remote store.

use std::env;
use std::time::Duration;

/// Default application name, used to namespace the storage key.
pub const DEFAULT_APP_NAME: &str = "cardsales";

/// Default interval between background sync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-request timeout of the HTTP remote store.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sync manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Application name, prefix of the storage key
    pub app_name: String,
    /// Interval between background sync passes
    pub sync_interval: Duration,
    /// Reject updates and deletes without a record id at queue time
    pub validate_operations: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            validate_operations: true,
        }
    }
}

impl SyncConfig {
    /// Storage key holding the pending queue.
    pub fn storage_key(&self) -> String {
        format!("{}_pending_operations", self.app_name)
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let app_name = env::var("CARDSALES_APP_NAME").unwrap_or(defaults.app_name);
        if app_name.is_empty() {
            return Err(ConfigError::EmptyAppName);
        }

        let sync_interval = match env::var("CARDSALES_SYNC_INTERVAL_MS") {
            Ok(raw) => parse_millis(&raw).ok_or(ConfigError::InvalidSyncInterval)?,
            Err(_) => defaults.sync_interval,
        };

        let validate_operations = match env::var("CARDSALES_VALIDATE_OPERATIONS") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidFlag(
                "CARDSALES_VALIDATE_OPERATIONS",
            ))?,
            Err(_) => defaults.validate_operations,
        };

        Ok(Self {
            app_name,
            sync_interval,
            validate_operations,
        })
    }
}

/// HTTP remote store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Base URL of the collection store server
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("CARDSALES_REMOTE_URL").map_err(|_| ConfigError::MissingRemoteUrl)?;

        let token = env::var("CARDSALES_REMOTE_TOKEN").ok();

        let timeout = match env::var("CARDSALES_REMOTE_TIMEOUT_MS") {
            Ok(raw) => parse_millis(&raw).ok_or(ConfigError::InvalidTimeout)?,
            Err(_) => DEFAULT_REMOTE_TIMEOUT,
        };

        Ok(Self {
            base_url,
            token,
            timeout,
        })
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CARDSALES_APP_NAME must not be empty")]
    EmptyAppName,

    #[error("Invalid CARDSALES_SYNC_INTERVAL_MS value")]
    InvalidSyncInterval,

    #[error("Invalid boolean value for {0}")]
    InvalidFlag(&'static str),

    #[error("CARDSALES_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid CARDSALES_REMOTE_TIMEOUT_MS value")]
    InvalidTimeout,
}
