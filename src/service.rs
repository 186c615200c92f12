//! # Monitor Service
//!
//! Wires the collaborators into the two periodic jobs and owns their lifecycle.
//!
//! ## Startup
//!
//! Configured channels are registered in order. Duplicates, channels that do not
//! exist and channels that cannot be read are left out with a warning; none of
//! these stops the service. The liveness evaluator loads the global
//! configuration modes, and an unreachable subscription store is fatal.
//!
//! ## Shutdown
//!
//! Timers stop first, the in-flight ticks get a bounded wait, then every channel
//! instance is zeroed and removed and the subscription instances are removed.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::error::{LogSourceError, MonitorError, Result};
use crate::liveness::{LivenessEvaluator, LivenessSettings};
use crate::metrics::MetricsSink;
use crate::platform::{LogSource, SubscriptionSource};
use crate::sampling::{sanitize_instance_name, ChannelCursorStore, RateSampler};
use crate::scheduler::{JobStatsSnapshot, Scheduler};

/// What shutdown cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub channel_instances_removed: usize,
    pub subscriptions_removed: usize,
    /// An in-flight tick outlived the shutdown timeout
    pub timed_out: bool,
}

/// Probe and register the configured channels, in order
pub async fn register_channels(
    channels: &[String],
    log_source: &dyn LogSource,
) -> ChannelCursorStore {
    let store = ChannelCursorStore::new();

    for channel in channels {
        if store.contains(channel) {
            crate::log_channel!(warn, "DUPLICATE", channel: channel);
            continue;
        }

        let initial_sequence = match probe_channel(channel, log_source).await {
            Ok(sequence) => sequence,
            Err(LogSourceError::ChannelNotFound { .. }) => {
                crate::log_channel!(warn, "NOT_FOUND", channel: channel);
                continue;
            }
            Err(e) => {
                crate::log_channel!(warn, "UNREADABLE", channel: channel, error_kind: e.kind(), error: e.to_string());
                continue;
            }
        };

        let instance_name = sanitize_instance_name(channel);
        if let Some(existing) = store
            .snapshot()
            .into_iter()
            .find(|cursor| cursor.instance_name == instance_name)
        {
            crate::log_channel!(
                warn,
                "INSTANCE_COLLISION",
                channel: channel,
                instance_name: instance_name,
                registered_channel: existing.name
            );
            continue;
        }

        if instance_name != *channel {
            crate::log_channel!(info, "SANITIZED", channel: channel, instance_name: instance_name);
        }

        store.register(channel.as_str(), initial_sequence);
        crate::log_channel!(info, "ADDED", channel: channel, initial_sequence: initial_sequence);
    }

    store
}

async fn probe_channel(
    channel: &str,
    log_source: &dyn LogSource,
) -> std::result::Result<u64, LogSourceError> {
    if log_source.record_count(channel).await? == 0 {
        return Ok(0);
    }
    log_source.latest_sequence(channel).await
}

#[derive(Debug)]
pub struct MonitorService {
    config: MonitorConfig,
    sampler: Arc<RateSampler>,
    evaluator: Arc<LivenessEvaluator>,
    scheduler: Scheduler,
    shut_down: AtomicBool,
}

impl MonitorService {
    /// Validate the configuration, register channels and build both jobs.
    /// Timers are not started yet.
    pub async fn new(
        config: MonitorConfig,
        log_source: Arc<dyn LogSource>,
        subscription_source: Arc<dyn SubscriptionSource>,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;

        let cursors = Arc::new(register_channels(&config.channels, log_source.as_ref()).await);
        if cursors.is_empty() {
            warn!("No configured channel could be registered; rate sampling is idle");
        }

        let sampler = Arc::new(RateSampler::new(
            log_source,
            Arc::clone(&sink),
            cursors,
            config.sampling_interval(),
        ));

        let evaluator = Arc::new(
            LivenessEvaluator::new(subscription_source, sink, LivenessSettings::from(&config))
                .await?,
        );

        let mut scheduler = Scheduler::new();
        scheduler.add_job(sampler.clone(), config.sampling_interval());
        scheduler.add_job(evaluator.clone(), config.liveness_interval());

        Ok(Self {
            config,
            sampler,
            evaluator,
            scheduler,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Start both timers
    pub fn start(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(MonitorError::InvalidState(
                "Monitor service has already been shut down".to_string(),
            ));
        }

        self.scheduler.start()?;

        info!(
            channels = self.sampler.cursors().len(),
            sampling_interval_ms = self.config.sampling_interval_ms,
            liveness_interval_ms = self.config.effective_liveness_interval_ms(),
            "Monitor service started"
        );
        Ok(())
    }

    /// Start, run until `signal` resolves, then shut down
    pub async fn run_until<F>(&self, signal: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        signal.await;
        info!("Shutdown requested");
        self.shutdown().await
    }

    /// Stop timers, wait for in-flight ticks and remove every published instance.
    /// Calling it again is a no-op returning an empty report.
    pub async fn shutdown(&self) -> Result<ShutdownReport> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(ShutdownReport::default());
        }

        info!("Stopping periodic jobs");
        let timed_out = match self.scheduler.shutdown(self.config.shutdown_timeout()).await {
            Ok(()) => false,
            Err(e) => {
                warn!(error = %e, "Tick aborted at shutdown timeout, proceeding with teardown");
                true
            }
        };

        info!("Removing published metric instances");
        let report = ShutdownReport {
            channel_instances_removed: self.sampler.teardown().await,
            subscriptions_removed: self.evaluator.teardown().await,
            timed_out,
        };

        info!(
            channel_instances_removed = report.channel_instances_removed,
            subscriptions_removed = report.subscriptions_removed,
            "Monitor service stopped"
        );
        Ok(report)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sampler(&self) -> &Arc<RateSampler> {
        &self.sampler
    }

    pub fn evaluator(&self) -> &Arc<LivenessEvaluator> {
        &self.evaluator
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn job_stats(&self) -> Vec<(String, JobStatsSnapshot)> {
        self.scheduler.stats()
    }
}
