//! Sync agent configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote API (no trailing slash)
    pub api_base_url: String,
    /// Directory holding the durable queue and credentials
    pub data_dir: PathBuf,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// Route of the credential refresh endpoint
    pub refresh_path: String,
    /// Route probed for reachability
    pub health_path: String,
    /// Interval between reachability probes
    pub probe_interval: Duration,
    /// Failed attempts before an entry is dead-lettered. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./sync-data"),
            http_timeout: Duration::from_secs(10),
            refresh_path: "/auth/refresh".to_string(),
            health_path: "/health".to_string(),
            probe_interval: Duration::from_secs(15),
            max_attempts: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let max_attempts = match env::var("SYNC_MAX_ATTEMPTS") {
            Ok(v) => Some(parse_var("SYNC_MAX_ATTEMPTS", &v)?),
            Err(_) => None,
        };
        if max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                name: "SYNC_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            api_base_url: env::var("SYNC_API_BASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SYNC_API_BASE_URL"))?,
            data_dir: env::var("SYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./sync-data")),
            http_timeout: secs_var("SYNC_HTTP_TIMEOUT_SECS", 10)?,
            refresh_path: env::var("SYNC_REFRESH_PATH")
                .unwrap_or_else(|_| "/auth/refresh".to_string()),
            health_path: env::var("SYNC_HEALTH_PATH").unwrap_or_else(|_| "/health".to_string()),
            probe_interval: secs_var("SYNC_PROBE_INTERVAL_SECS", 15)?,
            max_attempts,
        })
    }
}

/// A non-zero duration in whole seconds.
fn secs_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = match env::var(name) {
        Ok(v) => parse_var(name, &v)?,
        Err(_) => default,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
