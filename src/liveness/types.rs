//! Liveness data model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Subscription settings read fresh on every tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub name: String,
    pub enabled: bool,
    pub config_mode: Option<String>,
    pub custom_heartbeat_ms: Option<u64>,
}

impl Subscription {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            config_mode: None,
            custom_heartbeat_ms: None,
        }
    }

    pub fn with_config_mode<M: Into<String>>(mut self, mode: M) -> Self {
        self.config_mode = Some(mode.into());
        self
    }

    pub fn with_custom_heartbeat_ms(mut self, heartbeat_ms: u64) -> Self {
        self.custom_heartbeat_ms = Some(heartbeat_ms);
        self
    }
}

/// Snapshot of one forwarding source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub last_error: Option<i64>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Active and total source counts for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregateCount {
    pub active: u64,
    pub total: u64,
}

impl AggregateCount {
    pub const ZERO: AggregateCount = AggregateCount {
        active: 0,
        total: 0,
    };

    pub fn new(active: u64, total: u64) -> Self {
        debug_assert!(active <= total);
        Self { active, total }
    }
}

/// Why a subscription produced no counts this tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    UnresolvedPolicy(String),
    ReadFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::UnresolvedPolicy(detail) => write!(f, "unresolved heartbeat policy: {detail}"),
            SkipReason::ReadFailed(detail) => write!(f, "read failed: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSubscription {
    pub subscription: String,
    pub reason: SkipReason,
}

/// Result of one liveness tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub evaluated_at: DateTime<Utc>,
    /// Counts keyed by subscription name; every entry was handed to the sink
    pub counts: BTreeMap<String, AggregateCount>,
    pub skipped: Vec<SkippedSubscription>,
}

impl LivenessReport {
    pub fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            counts: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }

    pub fn count(&self, subscription: &str) -> Option<AggregateCount> {
        self.counts.get(subscription).copied()
    }

    pub fn skip_reason(&self, subscription: &str) -> Option<&SkipReason> {
        self.skipped
            .iter()
            .find(|s| s.subscription == subscription)
            .map(|s| &s.reason)
    }
}
