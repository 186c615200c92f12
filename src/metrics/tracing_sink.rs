//! Metrics sink that emits every value as a structured `tracing` event.
//!
//! Used when no platform counter binding is installed, for instance when the
//! monitor runs against the in-memory collaborators.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{MetricKey, MetricsSink, SinkResult};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn set(&self, key: &MetricKey, value: i64) -> SinkResult<()> {
        info!(
            category = %key.category,
            counter = %key.counter,
            instance = %key.instance,
            value = value,
            "Metric value published"
        );
        Ok(())
    }

    async fn remove(&self, key: &MetricKey) -> SinkResult<()> {
        debug!(
            category = %key.category,
            counter = %key.counter,
            instance = %key.instance,
            "Metric instance removed"
        );
        Ok(())
    }
}
