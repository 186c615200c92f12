//! # Monitor Configuration
//!
//! Configuration for the rate sampler, the liveness evaluator and the scheduler
//! that drives them. Values come from layered files plus environment overrides
//! (see [`ConfigManager`]) and are validated once, at startup; any violation is
//! fatal.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use logwatch::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! println!("sampling every {:?}", config.sampling_interval());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::constants::limits;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Channel list as written in configuration: a sequence, or one string with
/// `;`-separated names. Entries are trimmed and empty entries dropped.
fn deserialize_channel_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChannelListRepr {
        Joined(String),
        List(Vec<String>),
    }

    let names = match ChannelListRepr::deserialize(deserializer)? {
        ChannelListRepr::Joined(joined) => parse_channel_list(&joined),
        ChannelListRepr::List(list) => list
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    };

    Ok(names)
}

/// Split a `;`-separated channel list
pub fn parse_channel_list(joined: &str) -> Vec<String> {
    joined
        .split(limits::CHANNEL_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_max_concurrent_source_checks() -> usize {
    limits::DEFAULT_MAX_CONCURRENT_SOURCE_CHECKS
}

fn default_source_check_timeout_ms() -> u64 {
    limits::DEFAULT_SOURCE_CHECK_TIMEOUT_MS
}

fn default_shutdown_timeout_ms() -> u64 {
    limits::DEFAULT_SHUTDOWN_TIMEOUT_MS
}

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Channels to sample, in evaluation order
    #[serde(deserialize_with = "deserialize_channel_list")]
    pub channels: Vec<String>,

    /// Rate sampler period in milliseconds
    pub sampling_interval_ms: u64,

    /// Liveness evaluation period; falls back to the sampling period
    #[serde(default)]
    pub liveness_interval_ms: Option<u64>,

    /// Width of the worker pool evaluating sources within one subscription tick
    #[serde(default = "default_max_concurrent_source_checks")]
    pub max_concurrent_source_checks: usize,

    /// Bounded wait for a single source evaluation
    #[serde(default = "default_source_check_timeout_ms")]
    pub source_check_timeout_ms: u64,

    /// Bounded wait for an in-flight tick during shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl MonitorConfig {
    /// Create a configuration with default tuning values
    pub fn new<I, S>(channels: I, sampling_interval_ms: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            sampling_interval_ms,
            liveness_interval_ms: None,
            max_concurrent_source_checks: default_max_concurrent_source_checks(),
            source_check_timeout_ms: default_source_check_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    pub fn with_liveness_interval_ms(mut self, liveness_interval_ms: u64) -> Self {
        self.liveness_interval_ms = Some(liveness_interval_ms);
        self
    }

    pub fn with_max_concurrent_source_checks(mut self, max: usize) -> Self {
        self.max_concurrent_source_checks = max;
        self
    }

    pub fn with_source_check_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.source_check_timeout_ms = timeout_ms;
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.shutdown_timeout_ms = timeout_ms;
        self
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn effective_liveness_interval_ms(&self) -> u64 {
        self.liveness_interval_ms.unwrap_or(self.sampling_interval_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.effective_liveness_interval_ms())
    }

    pub fn source_check_timeout(&self) -> Duration {
        Duration::from_millis(self.source_check_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate every field, reporting the first violation
    pub fn validate(&self) -> ConfigResult<()> {
        if self.channels.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "channels",
                "monitor configuration (at least one event channel is required)",
            ));
        }

        if self.sampling_interval_ms < limits::MIN_SAMPLING_INTERVAL_MS {
            return Err(ConfigurationError::invalid_value(
                "sampling_interval_ms",
                self.sampling_interval_ms.to_string(),
                format!(
                    "minimum value is {} (one second)",
                    limits::MIN_SAMPLING_INTERVAL_MS
                ),
            ));
        }

        if let Some(liveness_ms) = self.liveness_interval_ms {
            if liveness_ms < limits::MIN_LIVENESS_INTERVAL_MS {
                return Err(ConfigurationError::invalid_value(
                    "liveness_interval_ms",
                    liveness_ms.to_string(),
                    format!("minimum value is {}", limits::MIN_LIVENESS_INTERVAL_MS),
                ));
            }
        }

        if self.max_concurrent_source_checks == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_concurrent_source_checks",
                "0",
                "at least one concurrent source check is required",
            ));
        }

        if self.source_check_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "source_check_timeout_ms",
                "0",
                "timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}
