//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and validates before any queue is built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_QUEUE_NAME: &str = "work";
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otel_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Settings for one queue and its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Label used in logs and metrics.
    pub name: String,
    /// Slots allocated at creation. Must be at least 1.
    pub initial_capacity: usize,
    /// Growth ceiling in slots. One slot always stays free, so a bounded
    /// queue holds at most `max_capacity - 1` items; values below 2 are
    /// rejected. `None` grows without bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<usize>,
    /// Consumer wake-up interval when no push notification arrives.
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_QUEUE_NAME.to_string(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::Config(
                "initial_capacity must be at least 1".to_string(),
            ));
        }
        match self.max_capacity {
            Some(max) if max < 2 => {
                return Err(Error::Config(format!(
                    "max_capacity {max} leaves no usable slot; it must be at least 2"
                )));
            }
            Some(max) if max < self.initial_capacity => {
                return Err(Error::Config(format!(
                    "max_capacity {max} is below initial_capacity {}",
                    self.initial_capacity
                )));
            }
            _ => {}
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            otel_endpoint: None,
            log_level: default_log_level(),
            queue: QueueConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = QueueConfig::default();
        let config = Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            queue: QueueConfig {
                name: std::env::var("WORKQ_QUEUE_NAME").unwrap_or(defaults.name),
                initial_capacity: parsed_var("WORKQ_INITIAL_CAPACITY")?
                    .unwrap_or(defaults.initial_capacity),
                max_capacity: parsed_var("WORKQ_MAX_CAPACITY")?,
                poll_interval_ms: parsed_var("WORKQ_POLL_INTERVAL_MS")?
                    .unwrap_or(defaults.poll_interval_ms),
            },
        };
        config.queue.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file with a `[queue]` table.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad config {}: {e}", path.display())))?;
        config.queue.validate()?;
        Ok(config)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("environment variable {name}={raw} is not valid"))),
        Err(_) => Ok(None),
    }
}
