//! Shared fixtures for the integration tests: instrumented collaborators that
//! can stall, count and fail on demand.

#![allow(dead_code)] // Not every test binary uses every fixture

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use logwatch::error::SubscriptionSourceError;
use logwatch::platform::{
    LogSource, LogSourceResult, MemoryLogSource, MemorySubscriptionSource, SubscriptionSource,
    SubscriptionSourceResult,
};

pub fn channel_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn seconds_ago(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    now - TimeDelta::seconds(seconds)
}

/// Poll until `condition` holds, yielding to the runtime in between
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

/// Log source whose `latest_sequence` reads can be held at a gate
#[derive(Debug)]
pub struct GatedLogSource {
    pub inner: MemoryLogSource,
    gate: Semaphore,
    gated: AtomicBool,
    reads_started: AtomicUsize,
}

impl GatedLogSource {
    pub fn new(inner: MemoryLogSource) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            reads_started: AtomicUsize::new(0),
        }
    }

    /// Hold every subsequent read until released
    pub fn close(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let `reads` held reads through
    pub fn release(&self, reads: usize) {
        self.gate.add_permits(reads);
    }

    /// Stop gating and release everything waiting
    pub fn open(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(1_000_000);
    }

    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSource for GatedLogSource {
    async fn record_count(&self, channel: &str) -> LogSourceResult<u64> {
        self.inner.record_count(channel).await
    }

    async fn latest_sequence(&self, channel: &str) -> LogSourceResult<u64> {
        self.reads_started.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.inner.latest_sequence(channel).await
    }
}

/// Subscription source that delays per-source reads and tracks how many run at
/// once
#[derive(Debug)]
pub struct InstrumentedSubscriptionSource {
    pub inner: MemorySubscriptionSource,
    source_delay: Duration,
    stalled_sources: DashSet<String>,
    vanish_during_source_reads: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    source_reads: AtomicUsize,
}

impl InstrumentedSubscriptionSource {
    pub fn new(inner: MemorySubscriptionSource) -> Self {
        Self::with_delay(inner, Duration::ZERO)
    }

    pub fn with_delay(inner: MemorySubscriptionSource, source_delay: Duration) -> Self {
        Self {
            inner,
            source_delay,
            stalled_sources: DashSet::new(),
            vanish_during_source_reads: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            source_reads: AtomicUsize::new(0),
        }
    }

    /// Reads of this source never complete in practice
    pub fn stall_source(&self, source: &str) {
        self.stalled_sources.insert(source.to_string());
    }

    /// Per-source reads report the subscription as removed
    pub fn vanish_during_source_reads(&self) {
        self.vanish_during_source_reads.store(true, Ordering::SeqCst);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn source_reads(&self) -> usize {
        self.source_reads.load(Ordering::SeqCst)
    }

    async fn enter_source_read(&self, subscription: &str, source: &str) -> SubscriptionSourceResult<()> {
        self.source_reads.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = if self.stalled_sources.contains(source) {
            Duration::from_secs(3600)
        } else {
            self.source_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.vanish_during_source_reads.load(Ordering::SeqCst) {
            return Err(SubscriptionSourceError::SubscriptionNotFound(
                subscription.to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSource for InstrumentedSubscriptionSource {
    async fn list_subscriptions(&self) -> SubscriptionSourceResult<Vec<String>> {
        self.inner.list_subscriptions().await
    }

    async fn is_enabled(&self, subscription: &str) -> SubscriptionSourceResult<bool> {
        self.inner.is_enabled(subscription).await
    }

    async fn custom_heartbeat_ms(
        &self,
        subscription: &str,
    ) -> SubscriptionSourceResult<Option<u64>> {
        self.inner.custom_heartbeat_ms(subscription).await
    }

    async fn config_mode(&self, subscription: &str) -> SubscriptionSourceResult<Option<String>> {
        self.inner.config_mode(subscription).await
    }

    async fn list_config_modes(&self) -> SubscriptionSourceResult<Vec<String>> {
        self.inner.list_config_modes().await
    }

    async fn global_heartbeat_ms(&self, mode: &str) -> SubscriptionSourceResult<Option<u64>> {
        self.inner.global_heartbeat_ms(mode).await
    }

    async fn list_sources(&self, subscription: &str) -> SubscriptionSourceResult<Vec<String>> {
        self.inner.list_sources(subscription).await
    }

    async fn source_last_error(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<i64>> {
        self.enter_source_read(subscription, source).await?;
        self.inner.source_last_error(subscription, source).await
    }

    async fn source_last_heartbeat(
        &self,
        subscription: &str,
        source: &str,
    ) -> SubscriptionSourceResult<Option<DateTime<Utc>>> {
        self.inner.source_last_heartbeat(subscription, source).await
    }
}
