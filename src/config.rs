//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::jobs::SyncSchedulerConfig;
use crate::runtime::RuntimeConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Idle period after which a resident actor deactivates
    pub actor_idle_timeout: Duration,

    /// Upper bound on activation replay before pending messages fail
    pub activation_timeout: Duration,

    /// Per-actor command queue depth
    pub mailbox_capacity: usize,

    /// Per-namespace event stream buffer
    pub stream_capacity: usize,

    /// Interval between catch-up scans for missing projection rows
    pub sync_differences_interval: Duration,

    /// Interval between full projection rebuilds
    pub full_resync_interval: Duration,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let actor_idle_timeout = Duration::from_secs(parse_env("ACTOR_IDLE_TIMEOUT_SECS", 300)?);

        let activation_timeout = Duration::from_secs(parse_env("ACTIVATION_TIMEOUT_SECS", 30)?);

        let mailbox_capacity = parse_env("ACTOR_MAILBOX_CAPACITY", 64)?;

        let stream_capacity = parse_env("STREAM_CAPACITY", 1024)?;

        let sync_differences_interval =
            Duration::from_secs(parse_env("SYNC_DIFFERENCES_INTERVAL_SECS", 30)?);

        let full_resync_interval =
            Duration::from_secs(parse_env("FULL_RESYNC_INTERVAL_SECS", 3600)?);

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            actor_idle_timeout,
            activation_timeout,
            mailbox_capacity,
            stream_capacity,
            sync_differences_interval,
            full_resync_interval,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Runtime settings derived from this configuration
    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            idle_timeout: self.actor_idle_timeout,
            activation_timeout: self.activation_timeout,
            mailbox_capacity: self.mailbox_capacity,
        }
    }

    /// Scheduler settings derived from this configuration
    pub fn scheduler(&self) -> SyncSchedulerConfig {
        SyncSchedulerConfig {
            differences_interval: self.sync_differences_interval,
            full_resync_interval: self.full_resync_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor_idle_timeout: Duration::from_secs(300),
            activation_timeout: Duration::from_secs(30),
            mailbox_capacity: 64,
            stream_capacity: 1024,
            sync_differences_interval: Duration::from_secs(30),
            full_resync_interval: Duration::from_secs(3600),
            environment: "development".to_string(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
