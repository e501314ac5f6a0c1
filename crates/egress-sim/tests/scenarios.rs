//! End-to-end driver scenarios from spec.md §8, run against the real
//! async stack via `egress_sim::driver::run`.

use egress_common::config::SimConfig;
use egress_common::error::SimError;
use std::time::Duration;

fn base_cfg() -> SimConfig {
    SimConfig {
        timeout_ms: 5_000,
        egress_window_size: 2,
        egress_stats_window_ms: 10_000,
        egress_stats_reconnect_window_ms: 10_000,
        egress_window_contract_timeout_ms: 200,
        egress_window_expand_reconnect_count: 2,
        egress_window_expand_step: 1,
        seed: Some(7),
        ..SimConfig::default()
    }
}

/// Scenario 1: happy path, zero fault probability.
#[tokio::test]
async fn happy_path_one_sender() {
    let mut cfg = base_cfg();
    cfg.sender_count = 1;
    cfg.send_size = 10;
    cfg.send_duration_ms = 100;

    let summary = egress_sim::driver::run(cfg).await.unwrap();
    assert_eq!(summary.senders_completed, 1);
    assert_eq!(summary.senders_total, 1);
    assert_eq!(summary.egresses_created, 2, "min_window_size egresses created up front");
    assert_eq!(summary.events_logged, 20);
}

/// Scenario 2 (drop storm, shaped as a deadline test): with
/// `drop_probability_per_second = 1.0` every egress eventually drops, so
/// senders never finish a long sequence before a short deadline; the run
/// must surface `SimError::Timeout` rather than hang or panic.
#[tokio::test]
async fn drop_storm_times_out() {
    let mut cfg = base_cfg();
    cfg.sender_count = 3;
    cfg.send_size = 100_000;
    cfg.send_duration_ms = 100_000;
    cfg.timeout_ms = 150;
    cfg.drop_probability_per_second = 1.0;
    cfg.drop_min_ms = 50;
    cfg.drop_max_ms = 50;

    let err = egress_sim::driver::run(cfg).await.unwrap_err();
    assert_eq!(err.downcast_ref::<SimError>(), Some(&SimError::Timeout));
}

/// Boundary: `sender_count = 0` returns within one scheduling epoch, no error.
#[tokio::test]
async fn zero_senders_is_a_no_op() {
    let mut cfg = base_cfg();
    cfg.sender_count = 0;

    let summary = tokio::time::timeout(Duration::from_millis(200), egress_sim::driver::run(cfg))
        .await
        .expect("must not hang with no senders")
        .unwrap();
    assert_eq!(summary.senders_total, 0);
    assert_eq!(summary.senders_completed, 0);
    assert_eq!(summary.events_logged, 0);
}

/// Boundary: `dst_weight = 0` still produces a valid completed run (pure
/// global-throughput selection).
#[tokio::test]
async fn dst_weight_zero_still_completes() {
    let mut cfg = base_cfg();
    cfg.sender_count = 2;
    cfg.send_size = 5;
    cfg.send_duration_ms = 50;
    cfg.dst_weight = 0.0;

    let summary = egress_sim::driver::run(cfg).await.unwrap();
    assert_eq!(summary.senders_completed, 2);
}
