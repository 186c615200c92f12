//! Rate sampler periodic job.
//!
//! Each tick walks the non-quarantined channels in configuration order:
//!
//! 1. read the record count; an empty channel has current sequence 0 and is
//!    not read further
//! 2. otherwise read the newest record's sequence number
//! 3. `eps = floor((current - previous) / interval_seconds)`, clamped to 0 when
//!    the sequence went backwards (channel cleared or recreated)
//! 4. store `current` and publish `eps` under the sanitized instance name
//!
//! The first tick after construction computes but does not publish, since the
//! previous sequence may predate the period. Any read failure quarantines the
//! channel permanently; it never aborts the tick.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{ChannelCursor, ChannelCursorStore};
use crate::constants::jobs;
use crate::error::{LogSourceError, Result};
use crate::metrics::{MetricKey, MetricsSink};
use crate::platform::LogSource;
use crate::scheduler::PeriodicJob;

/// Events per second between two sequence observations `interval` apart.
///
/// Integer floor division over milliseconds; a backwards sequence yields 0 and
/// results beyond `i64::MAX` saturate.
pub fn events_per_second(previous: u64, current: u64, interval: Duration) -> i64 {
    let delta = current.saturating_sub(previous) as u128;
    let interval_ms = interval.as_millis().max(1);
    let eps = delta * 1000 / interval_ms;
    i64::try_from(eps).unwrap_or(i64::MAX)
}

/// Outcome for one channel within a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSample {
    pub channel: String,
    pub instance_name: String,
    pub previous: u64,
    pub current: u64,
    pub eps: i64,
    /// The sequence went backwards since the previous tick
    pub reset: bool,
    /// The value reached the sink
    pub published: bool,
}

/// Everything one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    pub first_tick: bool,
    pub samples: Vec<ChannelSample>,
    /// Channels quarantined during this tick
    pub quarantined: Vec<String>,
}

impl SampleReport {
    pub fn sample(&self, channel: &str) -> Option<&ChannelSample> {
        self.samples.iter().find(|s| s.channel == channel)
    }

    pub fn published_count(&self) -> usize {
        self.samples.iter().filter(|s| s.published).count()
    }
}

#[derive(Debug)]
pub struct RateSampler {
    log_source: Arc<dyn LogSource>,
    sink: Arc<dyn MetricsSink>,
    cursors: Arc<ChannelCursorStore>,
    interval: Duration,
    first_tick: AtomicBool,
}

impl RateSampler {
    pub fn new(
        log_source: Arc<dyn LogSource>,
        sink: Arc<dyn MetricsSink>,
        cursors: Arc<ChannelCursorStore>,
        interval: Duration,
    ) -> Self {
        Self {
            log_source,
            sink,
            cursors,
            interval,
            first_tick: AtomicBool::new(true),
        }
    }

    pub fn cursors(&self) -> &Arc<ChannelCursorStore> {
        &self.cursors
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample every eligible channel once
    pub async fn tick(&self) -> SampleReport {
        let first_tick = self.first_tick.swap(false, Ordering::AcqRel);
        let mut report = SampleReport {
            first_tick,
            ..SampleReport::default()
        };

        for cursor in self.cursors.active() {
            match self.current_sequence(&cursor.name).await {
                Ok(current) => {
                    let sample = self.record_sample(&cursor, current, first_tick).await;
                    report.samples.push(sample);
                }
                Err(e) => {
                    if self.cursors.quarantine(&cursor.name) {
                        crate::log_channel!(
                            warn,
                            "QUARANTINED",
                            channel: cursor.name,
                            error_kind: e.kind(),
                            error: e.to_string()
                        );
                        report.quarantined.push(cursor.name.clone());
                    }
                }
            }
        }

        debug!(
            first_tick = first_tick,
            sampled = report.samples.len(),
            published = report.published_count(),
            quarantined = report.quarantined.len(),
            "Rate sampling tick finished"
        );

        report
    }

    async fn current_sequence(&self, channel: &str) -> std::result::Result<u64, LogSourceError> {
        let record_count = self.log_source.record_count(channel).await?;
        if record_count == 0 {
            return Ok(0);
        }
        self.log_source.latest_sequence(channel).await
    }

    async fn record_sample(
        &self,
        cursor: &ChannelCursor,
        current: u64,
        first_tick: bool,
    ) -> ChannelSample {
        let previous = cursor.last_sequence;
        let reset = current < previous;
        let eps = events_per_second(previous, current, self.interval);

        if reset {
            crate::log_channel!(
                warn,
                "RESET_DETECTED",
                channel: cursor.name,
                previous_sequence: previous,
                current_sequence: current
            );
        }

        self.cursors.advance(&cursor.name, current);

        let published = if first_tick {
            false
        } else {
            let key = MetricKey::channel_eps(cursor.instance_name.as_str());
            match self.sink.set(&key, eps).await {
                Ok(()) => true,
                Err(e) => {
                    crate::log_channel!(warn, "PUBLISH_FAILED", channel: cursor.name, error: e.to_string());
                    false
                }
            }
        };

        ChannelSample {
            channel: cursor.name.clone(),
            instance_name: cursor.instance_name.clone(),
            previous,
            current,
            eps,
            reset,
            published,
        }
    }

    /// Reset every channel instance to zero, then remove it. Quarantined
    /// channels are included. Returns the number of instances removed.
    pub async fn teardown(&self) -> usize {
        let mut removed = 0;

        for cursor in self.cursors.snapshot() {
            let key = MetricKey::channel_eps(cursor.instance_name.as_str());

            if let Err(e) = self.sink.set(&key, 0).await {
                crate::log_channel!(warn, "TEARDOWN_RESET_FAILED", channel: cursor.name, error: e.to_string());
            }

            match self.sink.remove(&key).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    crate::log_channel!(warn, "TEARDOWN_REMOVE_FAILED", channel: cursor.name, error: e.to_string());
                }
            }
        }

        removed
    }
}

#[async_trait]
impl PeriodicJob for RateSampler {
    fn name(&self) -> &str {
        jobs::RATE_SAMPLER
    }

    async fn run_tick(&self) -> Result<()> {
        self.tick().await;
        Ok(())
    }
}
