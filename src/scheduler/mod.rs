//! # Periodic Job Scheduler
//!
//! Drives each registered [`PeriodicJob`] from its own timer. Timers are
//! independent: a slow rate sampler never delays a liveness evaluation and vice
//! versa.
//!
//! Every job is wrapped in a [`JobRunner`] holding a [`TickGuard`]. When a timer
//! fires while the previous tick of the same job is still running, the new tick
//! is dropped (never queued) and counted as skipped.
//!
//! ## Shutdown
//!
//! [`Scheduler::shutdown`] first stops every timer, then waits (bounded) for
//! ticks already in flight. A tick that outlasts the bound is aborted, so once
//! this returns no tick can touch the metrics sink again. Teardown of published
//! metrics is the caller's job and must only start after that.

mod guard;

pub use guard::{TickGuard, TickPermit};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{MonitorError, Result};

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A unit of periodic work
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Stable name used in logs and statistics
    fn name(&self) -> &str;

    /// Run one tick. Errors are logged by the scheduler and do not stop the timer.
    async fn run_tick(&self) -> Result<()>;
}

/// Outcome of asking a runner to start a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDispatch {
    Started,
    /// The previous tick was still running
    Skipped,
}

/// Tick counters for one job
#[derive(Debug, Default)]
pub struct JobStats {
    started: AtomicU64,
    skipped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
    last_duration_ms: AtomicU64,
    has_duration: AtomicBool,
}

/// Point-in-time copy of [`JobStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStatsSnapshot {
    pub started: u64,
    pub skipped: u64,
    pub completed: u64,
    pub failed: u64,
    /// Ticks cancelled at shutdown
    pub aborted: u64,
    pub last_duration_ms: Option<u64>,
}

impl JobStats {
    fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_finished(&self, elapsed: Duration, succeeded: bool) {
        if succeeded {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.last_duration_ms
            .store(millis(elapsed), Ordering::Relaxed);
        self.has_duration.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            last_duration_ms: self
                .has_duration
                .load(Ordering::Acquire)
                .then(|| self.last_duration_ms.load(Ordering::Relaxed)),
        }
    }
}

/// One job, its period, guard and statistics
pub struct JobRunner {
    job: Arc<dyn PeriodicJob>,
    name: String,
    period: Duration,
    guard: Arc<TickGuard>,
    stats: Arc<JobStats>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    timer_shutdown: Notify,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("in_flight", &self.guard.is_held())
            .finish()
    }
}

impl JobRunner {
    pub fn new(job: Arc<dyn PeriodicJob>, period: Duration) -> Self {
        let name = job.name().to_string();
        Self {
            job,
            name,
            period,
            guard: Arc::new(TickGuard::new()),
            stats: Arc::new(JobStats::default()),
            in_flight: Mutex::new(None),
            timer_shutdown: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> JobStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_held()
    }

    /// Start a tick on a new task unless one is already in flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn fire(&self) -> TickDispatch {
        let Some(permit) = self.guard.try_acquire() else {
            self.stats.record_skipped();
            debug!(job = %self.name, "Tick skipped: previous tick still running");
            return TickDispatch::Skipped;
        };

        self.stats.record_started();

        let job = Arc::clone(&self.job);
        let stats = Arc::clone(&self.stats);
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            let outcome = job.run_tick().await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(()) => {
                    debug!(job = %name, duration_ms = millis(elapsed), "Tick completed");
                    stats.record_finished(elapsed, true);
                }
                Err(e) => {
                    warn!(job = %name, error = %e, duration_ms = millis(elapsed), "Tick failed");
                    stats.record_finished(elapsed, false);
                }
            }
        });

        *self.in_flight.lock() = Some(handle);
        TickDispatch::Started
    }

    /// Wait for the in-flight tick, if any. A tick still running after
    /// `timeout` is aborted, and `false` is returned once it has stopped.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let handle = self.in_flight.lock().take();
        let Some(mut handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(join_error)) => {
                error!(job = %self.name, error = %join_error, "Tick task panicked");
                true
            }
            Err(_) => {
                handle.abort();
                if let Err(join_error) = handle.await {
                    if !join_error.is_cancelled() {
                        error!(job = %self.name, error = %join_error, "Tick task panicked");
                    }
                }
                self.stats.record_aborted();
                warn!(job = %self.name, "In-flight tick aborted");
                false
            }
        }
    }

    async fn run_timer(self: Arc<Self>) {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(job = %self.name, period_ms = millis(self.period), "Timer started");

        loop {
            tokio::select! {
                _ = self.timer_shutdown.notified() => break,
                _ = ticker.tick() => {
                    self.fire();
                }
            }
        }

        debug!(job = %self.name, "Timer stopped");
    }
}

/// Owns the job runners and their timers
#[derive(Debug, Default)]
pub struct Scheduler {
    runners: Vec<Arc<JobRunner>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; must happen before [`start`](Scheduler::start)
    pub fn add_job(&mut self, job: Arc<dyn PeriodicJob>, period: Duration) -> Arc<JobRunner> {
        let runner = Arc::new(JobRunner::new(job, period));
        self.runners.push(Arc::clone(&runner));
        runner
    }

    pub fn runner(&self, name: &str) -> Option<Arc<JobRunner>> {
        self.runners.iter().find(|r| r.name() == name).cloned()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start one timer per job. The first tick of each job fires one period
    /// after start.
    pub fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MonitorError::InvalidState(
                "Scheduler is already running".to_string(),
            ));
        }

        let mut timers = self.timers.lock();
        for runner in &self.runners {
            timers.push(tokio::spawn(Arc::clone(runner).run_timer()));
        }

        info!(jobs = self.runners.len(), "Scheduler started");
        Ok(())
    }

    /// Stop every timer. Ticks already in flight keep running.
    pub async fn stop_timers(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        for runner in &self.runners {
            runner.timer_shutdown.notify_one();
        }

        let timers: Vec<JoinHandle<()>> = self.timers.lock().drain(..).collect();
        for result in futures::future::join_all(timers).await {
            if let Err(e) = result {
                error!(error = %e, "Timer task ended abnormally");
            }
        }

        info!("Scheduler timers stopped");
    }

    /// Stop timers, then wait up to `timeout` for in-flight ticks
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.stop_timers().await;

        let waits = self.runners.iter().map(|runner| async move {
            let idle = runner.wait_idle(timeout).await;
            if !idle {
                warn!(job = %runner.name(), timeout_ms = millis(timeout), "In-flight tick did not finish before shutdown timeout");
            }
            (runner.name().to_string(), idle)
        });

        let timed_out: Vec<String> = futures::future::join_all(waits)
            .await
            .into_iter()
            .filter(|(_, idle)| !idle)
            .map(|(name, _)| name)
            .collect();

        if timed_out.is_empty() {
            info!("Scheduler shut down");
            Ok(())
        } else {
            Err(MonitorError::Timeout(format!(
                "in-flight ticks still running: {}",
                timed_out.join(", ")
            )))
        }
    }

    /// Statistics for every job, in registration order
    pub fn stats(&self) -> Vec<(String, JobStatsSnapshot)> {
        self.runners
            .iter()
            .map(|r| (r.name().to_string(), r.stats()))
            .collect()
    }
}
