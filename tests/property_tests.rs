use chrono::{TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use logwatch::liveness::{is_source_active, LivenessEvaluator, LivenessSettings, SourceStatus};
use logwatch::metrics::MemoryMetricsSink;
use logwatch::platform::{MemorySubscriptionSource, SourceRecord, SubscriptionRecord};
use logwatch::sampling::events_per_second;
use logwatch::sanitize_instance_name;

fn source_strategy() -> impl Strategy<Value = (Option<i64>, Option<i64>)> {
    (
        prop_oneof![Just(None), Just(Some(0i64)), (1i64..1000).prop_map(Some)],
        prop::option::of(0i64..7200),
    )
}

proptest! {
    /// Property: the rate is the floored delta per second, never negative
    #[test]
    fn rate_matches_floor_of_delta_over_interval(
        previous in 0u64..1_000_000_000,
        current in 0u64..1_000_000_000,
        interval_ms in 1000u64..600_000,
    ) {
        let eps = events_per_second(previous, current, Duration::from_millis(interval_ms));
        if current >= previous {
            prop_assert_eq!(eps as u64, (current - previous) * 1000 / interval_ms);
        } else {
            prop_assert_eq!(eps, 0);
        }
    }

    /// Property: sanitizing is stable and leaves no reserved character behind
    #[test]
    fn sanitized_names_are_fixed_points(name in "[A-Za-z0-9 ()#/\\\\_-]{0,64}") {
        let once = sanitize_instance_name(&name);
        prop_assert_eq!(sanitize_instance_name(&once), once.clone());
        prop_assert!(once.chars().all(|c| !"()#/\\".contains(c)));
    }

    /// Property: a non-zero error code wins over any heartbeat
    #[test]
    fn nonzero_error_is_always_inactive(code in prop_oneof![i64::MIN..0, 1..i64::MAX], age_secs in 0i64..100_000) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let status = SourceStatus {
            name: "host".to_string(),
            last_error: Some(code),
            last_heartbeat: Some(now - TimeDelta::seconds(age_secs)),
        };
        prop_assert!(!is_source_active(&status, Duration::from_secs(60), now));
    }

    /// Property: total equals the number of sources and bounds active
    #[test]
    fn aggregate_counts_are_consistent(sources in prop::collection::vec(source_strategy(), 0..24)) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut record = SubscriptionRecord::enabled().with_custom_heartbeat_ms(600_000);
        let mut expected_active = 0u64;

        for (i, (last_error, age_secs)) in sources.iter().enumerate() {
            let status = SourceStatus {
                name: format!("host-{i}"),
                last_error: *last_error,
                last_heartbeat: age_secs.map(|secs| now - TimeDelta::seconds(secs)),
            };
            if is_source_active(&status, Duration::from_secs(600), now) {
                expected_active += 1;
            }
            record = record.with_source(
                &status.name,
                SourceRecord {
                    last_error: status.last_error,
                    last_heartbeat: status.last_heartbeat,
                },
            );
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let count = runtime.block_on(async {
            let store = Arc::new(MemorySubscriptionSource::new().with_subscription("Sub", record));
            let evaluator = LivenessEvaluator::new(
                store,
                Arc::new(MemoryMetricsSink::new()),
                LivenessSettings::default(),
            )
            .await
            .unwrap();
            evaluator.evaluate_at(now).await.unwrap().count("Sub").unwrap()
        });

        prop_assert_eq!(count.total, sources.len() as u64);
        prop_assert_eq!(count.active, expected_active);
        prop_assert!(count.active <= count.total);
    }
}
