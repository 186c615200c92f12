//! In-memory platform collaborators.
//!
//! Backed by `DashMap` so tests and bindings-free runs can mutate channel and
//! subscription state while the periodic jobs read it concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{LogSource, LogSourceResult, SubscriptionSource, SubscriptionSourceResult};
use crate::error::{LogSourceError, SubscriptionSourceError};

#[derive(Debug, Clone)]
struct MemoryChannel {
    record_count: u64,
    latest_sequence: u64,
    failure: Option<LogSourceError>,
}

/// Event-log channels held in memory
#[derive(Debug, Default)]
pub struct MemoryLogSource {
    channels: DashMap<String, MemoryChannel>,
    sequence_reads: AtomicU64,
}

impl MemoryLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel whose newest record carries `latest_sequence`
    pub fn with_channel(self, name: &str, latest_sequence: u64) -> Self {
        self.set_channel(name, latest_sequence, latest_sequence);
        self
    }

    pub fn set_channel(&self, name: &str, record_count: u64, latest_sequence: u64) {
        self.channels.insert(
            name.to_string(),
            MemoryChannel {
                record_count,
                latest_sequence,
                failure: None,
            },
        );
    }

    /// Write `count` new records to the channel
    pub fn append(&self, name: &str, count: u64) {
        let mut channel = self
            .channels
            .entry(name.to_string())
            .or_insert(MemoryChannel {
                record_count: 0,
                latest_sequence: 0,
                failure: None,
            });
        channel.record_count += count;
        channel.latest_sequence += count;
    }

    /// Clear the channel the way an administrator would: no records remain and
    /// numbering restarts at zero
    pub fn clear(&self, name: &str) {
        if let Some(mut channel) = self.channels.get_mut(name) {
            channel.record_count = 0;
            channel.latest_sequence = 0;
        }
    }

    /// Make subsequent reads of the channel fail. Metadata failures
    /// (`ChannelNotFound`, `ChannelUnavailable`) surface from `record_count`,
    /// everything else from `latest_sequence`.
    pub fn fail_with(&self, name: &str, error: LogSourceError) {
        if let Some(mut channel) = self.channels.get_mut(name) {
            channel.failure = Some(error);
        }
    }

    pub fn remove_channel(&self, name: &str) {
        self.channels.remove(name);
    }

    /// Number of `latest_sequence` reads served so far
    pub fn sequence_reads(&self) -> u64 {
        self.sequence_reads.load(Ordering::Relaxed)
    }

    fn channel(&self, name: &str) -> LogSourceResult<MemoryChannel> {
        self.channels
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LogSourceError::ChannelNotFound {
                channel: name.to_string(),
            })
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn record_count(&self, channel: &str) -> LogSourceResult<u64> {
        let state = self.channel(channel)?;
        match state.failure {
            Some(
                failure @ (LogSourceError::ChannelNotFound { .. }
                | LogSourceError::ChannelUnavailable { .. }),
            ) => Err(failure),
            _ => Ok(state.record_count),
        }
    }

    async fn latest_sequence(&self, channel: &str) -> LogSourceResult<u64> {
        self.sequence_reads.fetch_add(1, Ordering::Relaxed);
        let state = self.channel(channel)?;
        match state.failure {
            Some(failure) => Err(failure),
            None => Ok(state.latest_sequence),
        }
    }
}

/// Status of one forwarding source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub last_error: Option<i64>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl SourceRecord {
    /// A source that checked in but has not sent a heartbeat yet
    pub fn never_heartbeated() -> Self {
        Self::default()
    }

    pub fn heartbeat_at(last_heartbeat: DateTime<Utc>) -> Self {
        Self {
            last_error: None,
            last_heartbeat: Some(last_heartbeat),
        }
    }

    pub fn with_last_error(mut self, code: i64) -> Self {
        self.last_error = Some(code);
        self
    }
}

/// Configuration of one subscription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub enabled: bool,
    pub config_mode: Option<String>,
    pub custom_heartbeat_ms: Option<u64>,
    pub sources: BTreeMap<String, SourceRecord>,
    /// The sources key is missing, so enumeration fails
    pub sources_unavailable: bool,
}

impl SubscriptionRecord {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_config_mode(mut self, mode: &str) -> Self {
        self.config_mode = Some(mode.to_string());
        self
    }

    pub fn with_custom_heartbeat_ms(mut self, heartbeat_ms: u64) -> Self {
        self.custom_heartbeat_ms = Some(heartbeat_ms);
        self
    }

    pub fn with_source(mut self, name: &str, source: SourceRecord) -> Self {
        self.sources.insert(name.to_string(), source);
        self
    }

    pub fn with_sources_unavailable(mut self) -> Self {
        self.sources_unavailable = true;
        self
    }
}

/// Subscription configuration held in memory
#[derive(Debug)]
pub struct MemorySubscriptionSource {
    subscriptions: DashMap<String, SubscriptionRecord>,
    config_modes: DashMap<String, u64>,
    available: AtomicBool,
}

impl Default for MemorySubscriptionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySubscriptionSource {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
            config_modes: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_config_mode(self, mode: &str, heartbeat_ms: u64) -> Self {
        self.config_modes.insert(mode.to_string(), heartbeat_ms);
        self
    }

    pub fn with_subscription(self, name: &str, record: SubscriptionRecord) -> Self {
        self.upsert_subscription(name, record);
        self
    }

    pub fn upsert_subscription(&self, name: &str, record: SubscriptionRecord) {
        self.subscriptions.insert(name.to_string(), record);
    }

    pub fn remove_subscription(&self, name: &str) {
        self.subscriptions.remove(name);
    }

    pub fn set_source(&self, subscription: &str, source: &str, record: SourceRecord) {
        if let Some(mut entry) = self.subscriptions.get_mut(subscription) {
            entry.sources.insert(source.to_string(), record);
        }
    }

    /// Simulate losing (or regaining) the backing store
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    fn ensure_available(&self) -> SubscriptionSourceResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(SubscriptionSourceError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }

    fn subscription(&self, name: &str) -> SubscriptionSourceResult<SubscriptionRecord> {
        self.ensure_available()?;
        self.subscriptions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SubscriptionSourceError::SubscriptionNotFound(name.to_string()))
    }

    fn source(&self, subscription: &str, source: &str) -> SubscriptionSourceResult<SourceRecord> {
        self.subscription(subscription)?
            .sources
            .get(source)
            .cloned()
            .ok_or_else(|| SubscriptionSourceError::SourceNotFound {
                subscription: subscription.to_string(),
                source_name: source.to_string(),
            })
    }
}

#[async_trait]
impl SubscriptionSource for MemorySubscriptionSource {
    async fn list_subscriptions(&self) -> SubscriptionSourceResult<Vec<String>> {
        self.ensure_available()?;
        let mut names: Vec<String> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn is_enabled(&self, subscription: &str) -> SubscriptionSourceResult<bool> {
        Ok(self.subscription(subscription)?.enabled)
    }

    async fn custom_heartbeat_ms(
        &self,
        subscription: &str,
    ) -> SubscriptionSourceResult<Option<u64>> {
        Ok(self.subscription(subscription)?.custom_heartbeat_ms)
    }

    async fn config_mode(&self, subscription: &str) -> SubscriptionSourceResult<Option<String>> {
        Ok(self.subscription(subscription)?.config_mode)
    }

    async fn list_config_modes(&self) -> SubscriptionSourceResult<Vec<String>> {
        self.ensure_available()?;
        let mut modes: Vec<String> = self
            .config_modes
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        modes.sort();
        Ok(modes)
    }

    async fn global_heartbeat_ms(&self, mode: &str) -> SubscriptionSourceResult<Option<u64>> {
        self.ensure_available()?;
        Ok(self.config_modes.get(mode).map(|entry| *entry.value()))
    }

    async fn list_sources(&self, subscription: &str) -> SubscriptionSourceResult<Vec<String>> {
        let record = self.subscription(subscription)?;
        if record.sources_unavailable {
            return Err(SubscriptionSourceError::read_error(
                format!("{subscription}\\EventSources"),
                "sources key missing",
            ));
        }
        Ok(record.sources.keys().cloned().collect())
    }

    async fn source_last_error(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<i64>> {
        Ok(self.source(subscription, source)?.last_error)
    }

    async fn source_last_heartbeat(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<DateTime<Utc>>> {
        Ok(self.source(subscription, source)?.last_heartbeat)
    }
}
