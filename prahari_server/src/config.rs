//! Server configuration loaded from environment variables

use prahari_core::{BlockPolicy, ThrottleConfig};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,

    /// Public port for HTTP traffic
    pub port: u16,

    /// Bearer token for the admin surface; unset disables it entirely
    pub admin_token: Option<String>,

    /// hCaptcha verification secret; unset disables verification
    pub hcaptcha_secret: Option<String>,

    /// Failed attempts inside the monitoring window before a block fires
    pub max_failed_attempts: usize,

    /// How long a block lasts
    pub block_duration_ms: u64,

    /// How far back activity counts toward a threshold
    pub monitoring_window_ms: u64,

    /// Cadence of the periodic sweep
    pub cleanup_interval_ms: u64,

    /// Requests allowed per operation per rate window
    pub max_requests_per_window: u32,

    /// Rate window duration
    pub rate_window_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8080)?,
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|s| !s.is_empty()),
            hcaptcha_secret: env::var("HCAPTCHA_SECRET_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            max_failed_attempts: parse_env("MAX_FAILED_ATTEMPTS", 10)?,
            block_duration_ms: parse_env("BLOCK_DURATION_MS", 24 * 60 * 60 * 1000)?,
            monitoring_window_ms: parse_env("MONITORING_WINDOW_MS", 60 * 60 * 1000)?,
            cleanup_interval_ms: parse_env("CLEANUP_INTERVAL_MS", 60 * 60 * 1000)?,
            max_requests_per_window: parse_env("MAX_REQUESTS_PER_WINDOW", 5)?,
            rate_window_ms: parse_env("RATE_WINDOW_MS", 15 * 60 * 1000)?,
        })
    }

    /// Blocking policy derived from the numeric tunables
    pub fn block_policy(&self) -> BlockPolicy {
        BlockPolicy {
            max_failed_attempts: self.max_failed_attempts,
            block_duration_ms: self.block_duration_ms,
            monitoring_window_ms: self.monitoring_window_ms,
            cleanup_interval_ms: self.cleanup_interval_ms,
        }
    }

    /// Throttle configuration derived from the numeric tunables
    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.max_requests_per_window, self.rate_window_ms)
    }
}

/// Parse an environment variable, falling back to a default when unset
fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
