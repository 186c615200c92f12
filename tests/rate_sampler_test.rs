//! Rate sampler behaviour against in-memory channels.

mod common;

use std::sync::Arc;
use std::time::Duration;

use logwatch::error::LogSourceError;
use logwatch::metrics::{MemoryMetricsSink, MetricKey};
use logwatch::platform::MemoryLogSource;
use logwatch::sampling::{ChannelCursorStore, RateSampler};

fn build_sampler(
    source: Arc<MemoryLogSource>,
    sink: Arc<MemoryMetricsSink>,
    channels: &[&str],
    interval_ms: u64,
) -> RateSampler {
    RateSampler::new(
        source,
        sink,
        Arc::new(ChannelCursorStore::with_channels(common::channel_list(channels))),
        Duration::from_millis(interval_ms),
    )
}

#[tokio::test]
async fn test_two_channel_scenario() {
    let source = Arc::new(
        MemoryLogSource::new()
            .with_channel("App", 10)
            .with_channel("Sys", 0),
    );
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(source.clone(), sink.clone(), &["App", "Sys"], 1000);

    let first = sampler.tick().await;
    assert!(first.first_tick);
    assert!(sink.operations().is_empty(), "nothing is published after tick 1");

    source.append("App", 5);
    let second = sampler.tick().await;
    assert_eq!(second.published_count(), 2);

    assert_eq!(sink.get(&MetricKey::channel_eps("App")), Some(5));
    assert_eq!(sink.get(&MetricKey::channel_eps("Sys")), Some(0));
}

#[tokio::test]
async fn test_rate_uses_floor_over_interval_seconds() {
    let source = Arc::new(MemoryLogSource::new().with_channel("Application", 0));
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(source.clone(), sink.clone(), &["Application"], 4000);

    sampler.tick().await;
    source.append("Application", 10);
    sampler.tick().await;
    source.append("Application", 3);
    sampler.tick().await;

    assert_eq!(
        sink.history(&MetricKey::channel_eps("Application")),
        vec![2, 0]
    );
}

#[tokio::test]
async fn test_publishes_under_sanitized_instance_name() {
    let channel = "Microsoft-Windows-Sysmon/Operational";
    let source = Arc::new(MemoryLogSource::new().with_channel(channel, 100));
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(source.clone(), sink.clone(), &[channel], 1000);

    sampler.tick().await;
    source.append(channel, 30);
    sampler.tick().await;

    assert_eq!(
        sink.get(&MetricKey::channel_eps("Microsoft-Windows-Sysmon-Operational")),
        Some(30)
    );
    assert_eq!(sink.keys().len(), 1);
}

#[tokio::test]
async fn test_quarantine_is_permanent_even_after_recovery() {
    let source = Arc::new(
        MemoryLogSource::new()
            .with_channel("Application", 1)
            .with_channel("ForwardedEvents", 1),
    );
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(
        source.clone(),
        sink.clone(),
        &["Application", "ForwardedEvents"],
        1000,
    );

    source.fail_with(
        "ForwardedEvents",
        LogSourceError::ChannelDisabled {
            channel: "ForwardedEvents".to_string(),
            reason: "provider disabled".to_string(),
        },
    );
    let report = sampler.tick().await;
    assert_eq!(report.quarantined, vec!["ForwardedEvents"]);

    // the channel becomes readable again, but stays excluded
    source.set_channel("ForwardedEvents", 50, 50);
    for _ in 0..5 {
        source.append("Application", 2);
        let report = sampler.tick().await;
        assert!(report.sample("ForwardedEvents").is_none());
        assert!(sampler.cursors().is_quarantined("ForwardedEvents"));
    }

    assert!(!sink.contains(&MetricKey::channel_eps("ForwardedEvents")));
    assert_eq!(
        sink.history(&MetricKey::channel_eps("Application")),
        vec![2, 2, 2, 2, 2]
    );
}

#[tokio::test]
async fn test_vanished_channel_is_quarantined() {
    let source = Arc::new(
        MemoryLogSource::new()
            .with_channel("Application", 1)
            .with_channel("Setup", 1),
    );
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(source.clone(), sink.clone(), &["Application", "Setup"], 1000);

    sampler.tick().await;
    source.remove_channel("Setup");
    let report = sampler.tick().await;

    assert_eq!(report.quarantined, vec!["Setup"]);
    assert!(report.sample("Application").unwrap().published);
}

#[tokio::test]
async fn test_channel_reset_reports_zero_then_resumes() {
    let source = Arc::new(MemoryLogSource::new().with_channel("Security", 500));
    let sink = Arc::new(MemoryMetricsSink::new());
    let sampler = build_sampler(source.clone(), sink.clone(), &["Security"], 1000);

    sampler.tick().await;
    source.clear("Security");

    let report = sampler.tick().await;
    let sample = report.sample("Security").unwrap();
    assert!(sample.reset);
    assert_eq!((sample.previous, sample.current, sample.eps), (500, 0, 0));

    source.append("Security", 9);
    sampler.tick().await;

    assert_eq!(sink.history(&MetricKey::channel_eps("Security")), vec![0, 9]);
    assert!(!sampler.cursors().is_quarantined("Security"));
}
