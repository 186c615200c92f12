//! In-memory metrics sink.
//!
//! Keeps the current value of every instance plus an ordered log of the
//! operations received, so callers can inspect both the end state and how it was
//! reached.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use super::{MetricKey, MetricsSink, SinkResult};
use crate::error::SinkError;

/// One call received by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOperation {
    Set { key: MetricKey, value: i64 },
    Remove { key: MetricKey },
}

impl SinkOperation {
    pub fn key(&self) -> &MetricKey {
        match self {
            SinkOperation::Set { key, .. } | SinkOperation::Remove { key } => key,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    values: DashMap<MetricKey, i64>,
    operations: Mutex<Vec<SinkOperation>>,
    rejected_instances: DashSet<String>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of an instance
    pub fn get(&self, key: &MetricKey) -> Option<i64> {
        self.values.get(key).map(|entry| *entry.value())
    }

    pub fn contains(&self, key: &MetricKey) -> bool {
        self.values.contains_key(key)
    }

    /// Every live instance, sorted
    pub fn keys(&self) -> Vec<MetricKey> {
        let mut keys: Vec<MetricKey> = self.values.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Operations in the order they were received
    pub fn operations(&self) -> Vec<SinkOperation> {
        self.operations.lock().clone()
    }

    /// Values set for one instance, oldest first
    pub fn history(&self, key: &MetricKey) -> Vec<i64> {
        self.operations
            .lock()
            .iter()
            .filter_map(|op| match op {
                SinkOperation::Set { key: k, value } if k == key => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn set_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, SinkOperation::Set { .. }))
            .count()
    }

    /// Reject every subsequent operation on the named instance
    pub fn reject_instance(&self, instance: &str) {
        self.rejected_instances.insert(instance.to_string());
    }

    fn check_accepted(&self, operation: &str, key: &MetricKey) -> SinkResult<()> {
        if self.rejected_instances.contains(&key.instance) {
            return Err(SinkError::Rejected {
                operation: operation.to_string(),
                instance: key.instance.clone(),
                reason: "instance rejected by sink".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn set(&self, key: &MetricKey, value: i64) -> SinkResult<()> {
        self.check_accepted("set", key)?;
        self.values.insert(key.clone(), value);
        self.operations.lock().push(SinkOperation::Set {
            key: key.clone(),
            value,
        });
        Ok(())
    }

    async fn remove(&self, key: &MetricKey) -> SinkResult<()> {
        self.check_accepted("remove", key)?;
        self.values.remove(key);
        self.operations
            .lock()
            .push(SinkOperation::Remove { key: key.clone() });
        Ok(())
    }
}
