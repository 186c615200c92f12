//! Scheduler behaviour with real jobs: overlap suppression, independent timers
//! and bounded shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, GatedLogSource};
use logwatch::constants::jobs;
use logwatch::liveness::{HeartbeatPolicy, LivenessEvaluator, LivenessSettings};
use logwatch::metrics::{MemoryMetricsSink, MetricKey};
use logwatch::platform::{MemoryLogSource, MemorySubscriptionSource, SourceRecord, SubscriptionRecord};
use logwatch::sampling::{ChannelCursorStore, RateSampler};
use logwatch::scheduler::{JobRunner, Scheduler, TickDispatch};
use logwatch::MonitorError;

fn gated_sampler(
    source: Arc<GatedLogSource>,
    sink: Arc<MemoryMetricsSink>,
) -> Arc<RateSampler> {
    Arc::new(RateSampler::new(
        source,
        sink,
        Arc::new(ChannelCursorStore::with_channels(["App"])),
        Duration::from_millis(1000),
    ))
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped_without_duplicate_publish() {
    let source = Arc::new(GatedLogSource::new(
        MemoryLogSource::new().with_channel("App", 10),
    ));
    let sink = Arc::new(MemoryMetricsSink::new());
    let runner = JobRunner::new(
        gated_sampler(source.clone(), sink.clone()),
        Duration::from_millis(1000),
    );

    assert_eq!(runner.fire(), TickDispatch::Started);
    assert!(runner.wait_idle(Duration::from_secs(1)).await);

    source.inner.append("App", 5);
    source.close();
    assert_eq!(runner.fire(), TickDispatch::Started);
    eventually(|| source.reads_started() == 2).await;

    assert_eq!(runner.fire(), TickDispatch::Skipped);
    assert_eq!(runner.fire(), TickDispatch::Skipped);
    assert!(runner.is_running());

    source.open();
    assert!(runner.wait_idle(Duration::from_secs(1)).await);

    let stats = runner.stats();
    assert_eq!(stats.started, 2);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(source.reads_started(), 2);
    assert_eq!(sink.history(&MetricKey::channel_eps("App")), vec![5]);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_sampler_does_not_delay_liveness() {
    let log_source = Arc::new(GatedLogSource::new(
        MemoryLogSource::new().with_channel("App", 10),
    ));
    log_source.close();
    let sink = Arc::new(MemoryMetricsSink::new());

    let store = Arc::new(MemorySubscriptionSource::new().with_subscription(
        "Sub1",
        SubscriptionRecord::enabled()
            .with_custom_heartbeat_ms(60_000)
            .with_source("A", SourceRecord::never_heartbeated()),
    ));
    let evaluator = Arc::new(LivenessEvaluator::with_policy(
        store,
        sink.clone(),
        HeartbeatPolicy::default(),
        LivenessSettings::default(),
    ));

    let mut scheduler = Scheduler::new();
    scheduler.add_job(
        gated_sampler(log_source.clone(), sink.clone()),
        Duration::from_millis(1000),
    );
    scheduler.add_job(evaluator, Duration::from_millis(1000));
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(5500)).await;

    let sampler_stats = scheduler.runner(jobs::RATE_SAMPLER).unwrap().stats();
    let liveness_stats = scheduler.runner(jobs::LIVENESS_EVALUATOR).unwrap().stats();
    assert_eq!(sampler_stats.started, 1);
    assert!(sampler_stats.skipped >= 3);
    assert!(liveness_stats.completed >= 4);
    assert_eq!(sink.history(&MetricKey::total_sources("Sub1")).len() as u64, liveness_stats.completed);

    log_source.open();
    scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_tick_outliving_timeout() {
    let source = Arc::new(GatedLogSource::new(
        MemoryLogSource::new().with_channel("App", 10),
    ));
    source.close();
    let sink = Arc::new(MemoryMetricsSink::new());

    let mut scheduler = Scheduler::new();
    let runner = scheduler.add_job(
        gated_sampler(source.clone(), sink),
        Duration::from_millis(1000),
    );
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(runner.is_running());

    let err = scheduler
        .shutdown(Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Timeout(_)));
    assert!(!scheduler.is_running());

    // no timer fires after shutdown, even once the stuck tick finishes
    source.open();
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(runner.stats().started, 1);
}
