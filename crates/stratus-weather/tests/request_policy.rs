//! Contract tests for the weather request policy.
//!
//! These exercise the public policy functions the way the refresh
//! coordinator and the application call them.

use std::collections::BTreeSet;
use std::time::Duration;

use stratus_weather::{
    backoff_delay_for_failure, evaluate_request_gate, prune_timestamps_within_window,
    resolve_datasets_to_refresh, BackoffSchedule, BlockReason, DatasetRefreshInput,
    FreshnessThresholds, RequestGateConfig, RequestGateSnapshot, WeatherDataset,
};

const NOW: i64 = 1_750_000_000_000;

fn thresholds() -> FreshnessThresholds {
    FreshnessThresholds {
        current: Duration::from_secs(5 * 60),
        hourly: Duration::from_secs(30 * 60),
        daily: Duration::from_secs(3 * 60 * 60),
    }
}

fn input(ages_ms: [i64; 3], present: [bool; 3]) -> DatasetRefreshInput {
    DatasetRefreshInput {
        force: false,
        has_current: present[0],
        has_hourly: present[1],
        has_daily: present[2],
        current_updated_at_ms: NOW - ages_ms[0],
        hourly_updated_at_ms: NOW - ages_ms[1],
        daily_updated_at_ms: NOW - ages_ms[2],
        now_ms: NOW,
        thresholds: thresholds(),
    }
}

fn gate_config() -> RequestGateConfig {
    RequestGateConfig::new(Duration::from_secs(60), Duration::from_secs(60), 5).unwrap()
}

#[test]
fn missing_dataset_is_always_refreshed() {
    for age in [0, 1_000, 300_000, 10_000_000] {
        for (i, dataset) in WeatherDataset::ALL.into_iter().enumerate() {
            let mut present = [true; 3];
            present[i] = false;
            let mut ages = [1_000; 3];
            ages[i] = age;
            let resolved = resolve_datasets_to_refresh(&input(ages, present));
            assert_eq!(resolved, BTreeSet::from([dataset]), "{dataset} absent at age {age}");
        }
    }
}

#[test]
fn threshold_boundary_is_exclusive() {
    let at_threshold = input([300_000, 0, 0], [true; 3]);
    assert!(resolve_datasets_to_refresh(&at_threshold).is_empty());

    let past_threshold = input([300_001, 0, 0], [true; 3]);
    assert_eq!(
        resolve_datasets_to_refresh(&past_threshold),
        BTreeSet::from([WeatherDataset::Current])
    );
}

#[test]
fn force_overrides_presence_and_age() {
    let all: BTreeSet<_> = WeatherDataset::ALL.into_iter().collect();
    for present in [[true; 3], [false; 3], [true, false, true]] {
        let forced = DatasetRefreshInput {
            force: true,
            ..input([0, 0, 0], present)
        };
        assert_eq!(resolve_datasets_to_refresh(&forced), all);
    }
}

#[test]
fn gate_reports_every_blocking_reason() {
    let snapshot = RequestGateSnapshot {
        backoff_until_ms: Some(NOW + 40_000),
        location_last_request_at_ms: Some(NOW - 10_000),
        global_request_count: 5,
        global_oldest_request_at_ms: Some(NOW - 30_000),
    };
    let decision = evaluate_request_gate(NOW, &snapshot, &gate_config());

    assert!(!decision.is_allowed);
    assert_eq!(
        decision.reasons,
        BTreeSet::from([
            BlockReason::Backoff,
            BlockReason::PerLocationLimit,
            BlockReason::GlobalLimit
        ])
    );
    let tags: BTreeSet<String> = decision.reasons.iter().map(ToString::to_string).collect();
    assert!(tags.contains("backoff"));
    assert!(tags.contains("per-location limit"));
    assert!(tags.contains("global limit"));
    // unblock times: backoff +40s, per-location +50s, global +30s
    assert_eq!(decision.next_allowed_at_ms, Some(NOW + 50_000));
}

#[test]
fn gate_allows_when_nothing_applies() {
    let snapshot = RequestGateSnapshot {
        backoff_until_ms: None,
        location_last_request_at_ms: None,
        global_request_count: 4,
        global_oldest_request_at_ms: Some(NOW - 1_000),
    };
    let decision = evaluate_request_gate(NOW, &snapshot, &gate_config());
    assert!(decision.is_allowed);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.next_allowed_at_ms, None);
}

#[test]
fn backoff_escalates_then_plateaus() {
    let schedule = BackoffSchedule::from_secs(&[5, 15, 60, 300]).unwrap();
    let delays: Vec<u64> = (1..=5)
        .map(|n| backoff_delay_for_failure(n, &schedule).as_secs())
        .collect();
    assert_eq!(delays, vec![5, 15, 60, 300, 300]);
}

#[test]
fn pruning_keeps_only_recent_requests() {
    let history = [NOW - 90_000, NOW - 59_000, NOW - 1_000];
    let pruned = prune_timestamps_within_window(&history, NOW, Duration::from_secs(60));
    assert_eq!(pruned, vec![NOW - 59_000, NOW - 1_000]);
}

#[test]
fn pruning_is_idempotent() {
    let history = [NOW - 90_000, NOW - 60_000, NOW - 59_000, NOW - 1_000];
    let window = Duration::from_secs(60);
    let once = prune_timestamps_within_window(&history, NOW, window);
    assert_eq!(prune_timestamps_within_window(&once, NOW, window), once);
}

#[test]
fn gate_only_sees_the_snapshot_it_is_given() {
    let location_a = RequestGateSnapshot {
        backoff_until_ms: Some(NOW + 300_000),
        ..Default::default()
    };
    let location_b = RequestGateSnapshot::default();

    let decision_a = evaluate_request_gate(NOW, &location_a, &gate_config());
    let decision_b = evaluate_request_gate(NOW, &location_b, &gate_config());
    assert!(decision_a.is_blocked_by(BlockReason::Backoff));
    assert!(decision_b.is_allowed);
}
