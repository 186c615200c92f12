//! Liveness evaluator periodic job.
//!
//! Subscriptions are read fresh every tick and handled one after another. Within
//! a subscription the sources are checked concurrently on a bounded worker pool,
//! each check limited by a timeout. The per-subscription counts are published
//! only after the whole tick has been computed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::policy::{is_source_active, GlobalModeTable, HeartbeatPolicy};
use super::types::{
    AggregateCount, LivenessReport, SkipReason, SkippedSubscription, SourceStatus, Subscription,
};
use crate::config::MonitorConfig;
use crate::constants::{jobs, limits};
use crate::error::{MonitorError, Result, SubscriptionSourceError};
use crate::metrics::{MetricKey, MetricsSink};
use crate::platform::SubscriptionSource;
use crate::scheduler::PeriodicJob;

/// Worker pool settings for the per-source fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessSettings {
    pub max_concurrent_source_checks: usize,
    pub source_check_timeout: Duration,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            max_concurrent_source_checks: limits::DEFAULT_MAX_CONCURRENT_SOURCE_CHECKS,
            source_check_timeout: Duration::from_millis(limits::DEFAULT_SOURCE_CHECK_TIMEOUT_MS),
        }
    }
}

impl From<&MonitorConfig> for LivenessSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_concurrent_source_checks: config.max_concurrent_source_checks,
            source_check_timeout: config.source_check_timeout(),
        }
    }
}

enum SubscriptionOutcome {
    Counted(AggregateCount),
    Skipped(SkipReason),
}

enum SourceCheck {
    Active,
    Inactive,
    SubscriptionGone,
}

#[derive(Debug)]
pub struct LivenessEvaluator {
    store: Arc<dyn SubscriptionSource>,
    sink: Arc<dyn MetricsSink>,
    policy: HeartbeatPolicy,
    settings: LivenessSettings,
    worker_pool: Arc<Semaphore>,
    published: Mutex<BTreeSet<String>>,
}

impl LivenessEvaluator {
    /// Build an evaluator, loading the global configuration-mode table.
    ///
    /// Fails with [`MonitorError::CollaboratorUnavailable`] when the
    /// configuration store cannot be reached.
    pub async fn new(
        store: Arc<dyn SubscriptionSource>,
        sink: Arc<dyn MetricsSink>,
        settings: LivenessSettings,
    ) -> Result<Self> {
        let modes = GlobalModeTable::load(store.as_ref())
            .await
            .map_err(|e| MonitorError::collaborator_unavailable("subscription_source", e))?;

        info!(
            config_modes = modes.len(),
            max_concurrent_source_checks = settings.max_concurrent_source_checks,
            "Liveness evaluator initialized"
        );

        Ok(Self::with_policy(
            store,
            sink,
            HeartbeatPolicy::new(modes),
            settings,
        ))
    }

    /// Build an evaluator around an already-loaded policy
    pub fn with_policy(
        store: Arc<dyn SubscriptionSource>,
        sink: Arc<dyn MetricsSink>,
        policy: HeartbeatPolicy,
        settings: LivenessSettings,
    ) -> Self {
        let permits = settings.max_concurrent_source_checks.max(1);
        Self {
            store,
            sink,
            policy,
            settings,
            worker_pool: Arc::new(Semaphore::new(permits)),
            published: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn policy(&self) -> &HeartbeatPolicy {
        &self.policy
    }

    /// Evaluate every subscription against the current time
    pub async fn tick(&self) -> Result<LivenessReport> {
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate every subscription against `now` and publish the counts
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Result<LivenessReport> {
        let names = self.store.list_subscriptions().await?;
        let mut report = LivenessReport::new(now);

        for name in names {
            match self.evaluate_subscription(&name, now).await {
                SubscriptionOutcome::Counted(count) => {
                    report.counts.insert(name, count);
                }
                SubscriptionOutcome::Skipped(reason) => {
                    report.skipped.push(SkippedSubscription {
                        subscription: name,
                        reason,
                    });
                }
            }
        }

        self.publish(&report).await;

        debug!(
            counted = report.counts.len(),
            skipped = report.skipped.len(),
            "Liveness tick finished"
        );

        Ok(report)
    }

    async fn evaluate_subscription(&self, name: &str, now: DateTime<Utc>) -> SubscriptionOutcome {
        let subscription = match self.read_subscription(name).await {
            Ok(subscription) => subscription,
            Err(SubscriptionSourceError::SubscriptionNotFound(_)) => {
                crate::log_subscription!(warn, "VANISHED", subscription: name);
                return SubscriptionOutcome::Counted(AggregateCount::ZERO);
            }
            Err(e) => {
                crate::log_subscription!(warn, "READ_FAILED", subscription: name, error: e.to_string());
                return SubscriptionOutcome::Skipped(SkipReason::ReadFailed(e.to_string()));
            }
        };

        if !subscription.enabled {
            crate::log_subscription!(debug, "DISABLED", subscription: name);
            return SubscriptionOutcome::Skipped(SkipReason::Disabled);
        }

        let interval = match self.policy.resolve(&subscription) {
            Ok(interval) => interval,
            Err(e) => {
                crate::log_subscription!(
                    warn,
                    "POLICY_UNRESOLVED",
                    subscription: name,
                    config_mode: subscription.config_mode
                );
                return SubscriptionOutcome::Skipped(SkipReason::UnresolvedPolicy(e.to_string()));
            }
        };

        let sources = match self.store.list_sources(name).await {
            Ok(sources) => sources,
            Err(e) => {
                crate::log_subscription!(warn, "ZEROED", subscription: name, error: e.to_string());
                return SubscriptionOutcome::Counted(AggregateCount::ZERO);
            }
        };

        if sources.is_empty() {
            return SubscriptionOutcome::Counted(AggregateCount::ZERO);
        }

        match self.count_sources(name, sources, interval, now).await {
            Some(count) => SubscriptionOutcome::Counted(count),
            None => {
                crate::log_subscription!(warn, "VANISHED", subscription: name);
                SubscriptionOutcome::Counted(AggregateCount::ZERO)
            }
        }
    }

    async fn read_subscription(
        &self,
        name: &str,
    ) -> std::result::Result<Subscription, SubscriptionSourceError> {
        let mut subscription = Subscription::new(name);
        subscription.enabled = self.store.is_enabled(name).await?;
        if !subscription.enabled {
            return Ok(subscription);
        }

        subscription.custom_heartbeat_ms = match self.store.custom_heartbeat_ms(name).await {
            Ok(value) => value,
            Err(e @ SubscriptionSourceError::SubscriptionNotFound(_)) => return Err(e),
            Err(e) => {
                crate::log_subscription!(debug, "CUSTOM_HEARTBEAT_UNREADABLE", subscription: name, error: e.to_string());
                None
            }
        };

        subscription.config_mode = match self.store.config_mode(name).await {
            Ok(value) => value,
            Err(e @ SubscriptionSourceError::SubscriptionNotFound(_)) => return Err(e),
            Err(e) => {
                crate::log_subscription!(debug, "CONFIG_MODE_UNREADABLE", subscription: name, error: e.to_string());
                None
            }
        };

        Ok(subscription)
    }

    /// Check every source concurrently. `None` when the subscription disappeared
    /// while its sources were being read.
    async fn count_sources(
        &self,
        subscription: &str,
        sources: Vec<String>,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Option<AggregateCount> {
        let total = sources.len() as u64;
        let mut checks = JoinSet::new();

        for source_name in sources {
            let store = Arc::clone(&self.store);
            let worker_pool = Arc::clone(&self.worker_pool);
            let subscription = subscription.to_string();
            let timeout = self.settings.source_check_timeout;

            checks.spawn(async move {
                let Ok(_permit) = worker_pool.acquire_owned().await else {
                    return SourceCheck::Inactive;
                };
                check_source(store, subscription, source_name, interval, now, timeout).await
            });
        }

        let mut active = 0u64;
        let mut gone = false;
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(SourceCheck::Active) => active += 1,
                Ok(SourceCheck::Inactive) => {}
                Ok(SourceCheck::SubscriptionGone) => gone = true,
                Err(e) => {
                    warn!(subscription = %subscription, error = %e, "Source check task failed");
                }
            }
        }

        if gone {
            None
        } else {
            Some(AggregateCount::new(active, total))
        }
    }

    async fn publish(&self, report: &LivenessReport) {
        for (subscription, count) in &report.counts {
            self.published.lock().insert(subscription.clone());

            let values = [
                (MetricKey::active_sources(subscription.as_str()), count.active),
                (MetricKey::total_sources(subscription.as_str()), count.total),
            ];

            for (key, value) in values {
                let value = i64::try_from(value).unwrap_or(i64::MAX);
                if let Err(e) = self.sink.set(&key, value).await {
                    crate::log_subscription!(
                        warn,
                        "PUBLISH_FAILED",
                        subscription: subscription,
                        counter: key.counter,
                        error: e.to_string()
                    );
                }
            }
        }
    }

    /// Subscriptions with instances published at some point
    pub fn published_subscriptions(&self) -> Vec<String> {
        self.published.lock().iter().cloned().collect()
    }

    /// Remove every subscription instance this evaluator published. Returns the
    /// number of subscriptions torn down.
    pub async fn teardown(&self) -> usize {
        let subscriptions: Vec<String> = std::mem::take(&mut *self.published.lock())
            .into_iter()
            .collect();

        for subscription in &subscriptions {
            for key in [
                MetricKey::active_sources(subscription.as_str()),
                MetricKey::total_sources(subscription.as_str()),
            ] {
                if let Err(e) = self.sink.remove(&key).await {
                    crate::log_subscription!(warn, "TEARDOWN_REMOVE_FAILED", subscription: subscription, error: e.to_string());
                }
            }
        }

        subscriptions.len()
    }
}

async fn check_source(
    store: Arc<dyn SubscriptionSource>,
    subscription: String,
    source_name: String,
    interval: Duration,
    now: DateTime<Utc>,
    timeout: Duration,
) -> SourceCheck {
    let read = async {
        let last_error = store.source_last_error(&subscription, &source_name).await?;
        let last_heartbeat = store
            .source_last_heartbeat(&subscription, &source_name)
            .await?;
        Ok::<_, SubscriptionSourceError>(SourceStatus {
            name: source_name.clone(),
            last_error,
            last_heartbeat,
        })
    };

    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(status)) => {
            if is_source_active(&status, interval, now) {
                SourceCheck::Active
            } else {
                SourceCheck::Inactive
            }
        }
        Ok(Err(SubscriptionSourceError::SubscriptionNotFound(_))) => SourceCheck::SubscriptionGone,
        Ok(Err(e)) => {
            debug!(
                subscription = %subscription,
                source = %source_name,
                error = %e,
                "Source status unreadable; counting it inactive"
            );
            SourceCheck::Inactive
        }
        Err(_) => {
            warn!(
                subscription = %subscription,
                source = %source_name,
                timeout_ms = timeout.as_millis() as u64,
                "Source check timed out; counting it inactive"
            );
            SourceCheck::Inactive
        }
    }
}

#[async_trait]
impl PeriodicJob for LivenessEvaluator {
    fn name(&self) -> &str {
        jobs::LIVENESS_EVALUATOR
    }

    async fn run_tick(&self) -> Result<()> {
        self.tick().await.map(|_| ())
    }
}
