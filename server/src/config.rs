//! Collection store settings, read from the environment (and `.env`).

use std::env;
use std::str::FromStr;

/// Settings for one collection store process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to listen on (`HOST`, default all interfaces)
    pub host: String,
    /// Listen port (`PORT`, default 3000)
    pub port: u16,
    /// Postgres holding `collection_records` (`DATABASE_URL`, required)
    pub database_url: String,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`, default 10)
    pub max_connections: u32,
    /// Shared secret sync clients send as their bearer token
    /// (`AUTH_SECRET`); unset or empty leaves the store open
    pub auth_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or(env::var("PORT").ok(), 3000, ConfigError::InvalidPort)?,
            database_url: env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?,
            max_connections: parse_or(
                env::var("DATABASE_MAX_CONNECTIONS").ok(),
                10,
                ConfigError::InvalidMaxConnections,
            )?,
            auth_secret: env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(raw: Option<String>, default: T, err: ConfigError) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| err),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must point at the collection store database")]
    MissingDatabaseUrl,

    #[error("PORT must be a number between 0 and 65535")]
    InvalidPort,

    #[error("DATABASE_MAX_CONNECTIONS must be a positive number")]
    InvalidMaxConnections,
}
