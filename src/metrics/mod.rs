//! # Metrics Sink
//!
//! Destination for the derived values. The monitor only sets and removes named
//! numeric instances; category registration, transport and storage belong to the
//! sink implementation.
//!
//! Two counter families are published:
//!
//! - `Windows Event Log` / `Channel EPS rate`, one instance per sampled channel
//!   (keyed by the sanitized channel name)
//! - `Windows Event Forwarding` / `Active Event Source Count` and
//!   `Total Event Source Count`, one instance per subscription

pub mod memory;
pub mod tracing_sink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::metrics;
use crate::error::SinkError;

pub use memory::{MemoryMetricsSink, SinkOperation};
pub use tracing_sink::TracingMetricsSink;

pub type SinkResult<T> = Result<T, SinkError>;

/// Fully-qualified metric instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricKey {
    pub category: String,
    pub counter: String,
    pub instance: String,
}

impl MetricKey {
    pub fn new<C, N, I>(category: C, counter: N, instance: I) -> Self
    where
        C: Into<String>,
        N: Into<String>,
        I: Into<String>,
    {
        Self {
            category: category.into(),
            counter: counter.into(),
            instance: instance.into(),
        }
    }

    /// Events-per-second instance for a channel; `instance` must already be sanitized
    pub fn channel_eps<I: Into<String>>(instance: I) -> Self {
        Self::new(
            metrics::EVENT_LOG_CATEGORY,
            metrics::CHANNEL_EPS_COUNTER,
            instance,
        )
    }

    pub fn active_sources<I: Into<String>>(subscription: I) -> Self {
        Self::new(
            metrics::EVENT_FORWARDING_CATEGORY,
            metrics::ACTIVE_SOURCES_COUNTER,
            subscription,
        )
    }

    pub fn total_sources<I: Into<String>>(subscription: I) -> Self {
        Self::new(
            metrics::EVENT_FORWARDING_CATEGORY,
            metrics::TOTAL_SOURCES_COUNTER,
            subscription,
        )
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}({})", self.category, self.counter, self.instance)
    }
}

/// Receives named numeric values
#[async_trait]
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// Set the raw value of an instance, creating it when absent
    async fn set(&self, key: &MetricKey, value: i64) -> SinkResult<()>;

    /// Remove an instance; removing an absent instance is not an error
    async fn remove(&self, key: &MetricKey) -> SinkResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_constructors() {
        let key = MetricKey::channel_eps("Microsoft-Windows-Sysmon-Operational");
        assert_eq!(key.category, "Windows Event Log");
        assert_eq!(key.counter, "Channel EPS rate");
        assert_eq!(
            key.to_string(),
            "Windows Event Log\\Channel EPS rate(Microsoft-Windows-Sysmon-Operational)"
        );

        assert_eq!(
            MetricKey::active_sources("Sub1").counter,
            "Active Event Source Count"
        );
        assert_eq!(
            MetricKey::total_sources("Sub1").category,
            "Windows Event Forwarding"
        );
    }
}
