//! # Platform Collaborators
//!
//! Read-only accessors over event-log channel state and event-forwarding
//! subscription configuration. Platform bindings (the Windows event log API and
//! the event collector registry hive) implement these traits; the monitor never
//! talks to the operating system directly.
//!
//! The log collaborator must expose the newest record's sequence number directly.
//! Bookmark handles are opaque and are never parsed here.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Debug;

use crate::error::{LogSourceError, SubscriptionSourceError};

pub use memory::{MemoryLogSource, MemorySubscriptionSource, SourceRecord, SubscriptionRecord};

pub type LogSourceResult<T> = Result<T, LogSourceError>;
pub type SubscriptionSourceResult<T> = Result<T, SubscriptionSourceError>;

/// Access to local event-log channels
#[async_trait]
pub trait LogSource: Send + Sync + Debug {
    /// Total number of records currently held by the channel
    async fn record_count(&self, channel: &str) -> LogSourceResult<u64>;

    /// Sequence number of the newest record (a single reverse-ordered read).
    ///
    /// Only called when [`record_count`](LogSource::record_count) is non-zero;
    /// reading an empty channel can block indefinitely on some platforms.
    async fn latest_sequence(&self, channel: &str) -> LogSourceResult<u64>;
}

/// Access to event-forwarding subscription configuration and source status.
///
/// Constructing an implementation is expected to fail when the configuration
/// store is unreachable; individual reads then report per-item errors.
#[async_trait]
pub trait SubscriptionSource: Send + Sync + Debug {
    async fn list_subscriptions(&self) -> SubscriptionSourceResult<Vec<String>>;

    async fn is_enabled(&self, subscription: &str) -> SubscriptionSourceResult<bool>;

    async fn custom_heartbeat_ms(&self, subscription: &str)
        -> SubscriptionSourceResult<Option<u64>>;

    async fn config_mode(&self, subscription: &str) -> SubscriptionSourceResult<Option<String>>;

    /// Names of the global configuration modes (Normal, MinLatency, ...)
    async fn list_config_modes(&self) -> SubscriptionSourceResult<Vec<String>>;

    async fn global_heartbeat_ms(&self, mode: &str) -> SubscriptionSourceResult<Option<u64>>;

    async fn list_sources(&self, subscription: &str) -> SubscriptionSourceResult<Vec<String>>;

    async fn source_last_error(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<i64>>;

    async fn source_last_heartbeat(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<DateTime<Utc>>>;
}

/// 100-nanosecond intervals between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;
const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert a Windows FILETIME (100 ns ticks since 1601-01-01 UTC) to UTC.
///
/// Heartbeat times are stored as raw FILETIME values in the collector's
/// registry; bindings hand them through this conversion. Negative values are
/// not valid FILETIMEs and yield `None`.
pub fn filetime_to_utc(filetime: i64) -> Option<DateTime<Utc>> {
    if filetime < 0 {
        return None;
    }

    let since_unix = filetime - FILETIME_UNIX_EPOCH_OFFSET;
    let seconds = since_unix.div_euclid(FILETIME_TICKS_PER_SECOND);
    let nanos = (since_unix.rem_euclid(FILETIME_TICKS_PER_SECOND) * 100) as u32;

    Utc.timestamp_opt(seconds, nanos).single()
}
