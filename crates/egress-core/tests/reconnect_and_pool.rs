//! Integration tests driving the real async stack — controller, egresses,
//! and senders together — rather than mocking any of them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egress_common::ConnectionTuple;
use egress_core::controller::{Controller, ControllerConfig};
use egress_core::fault::FaultConfig;
use egress_core::sender::{self, SenderConfig};
use egress_stats::EventLogWindow;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;

fn no_fault() -> FaultConfig {
    FaultConfig {
        drop_probability_per_second: 0.0,
        drop_min: Duration::from_secs(5),
        drop_max: Duration::from_secs(10),
        block_probability_per_dst: 0.0,
        block_delay: Duration::from_millis(0),
        block_min: Duration::from_secs(5),
        block_max: Duration::from_secs(10),
    }
}

fn controller_with(
    min_window_size: usize,
    expand_reconnect_count: usize,
    fault_cfg: FaultConfig,
) -> (Arc<Controller>, Arc<EventLogWindow>, watch::Sender<bool>) {
    let stats = Arc::new(EventLogWindow::new());
    let cfg = ControllerConfig {
        min_window_size,
        stats_window: Duration::from_secs(10),
        reconnect_window: Duration::from_secs(10),
        estimate_net_transfer: 1.0,
        estimate_net_transfer_to_dst: 1.0,
        dst_weight: 0.5,
        contract_timeout: Duration::from_millis(50),
        expand_reconnect_count,
        expand_step: 1,
    };
    let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(99)));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let controller = Controller::new(stats.clone(), cfg, fault_cfg, rng, cancel_rx);
    (controller, stats, cancel_tx)
}

/// Scenario 1 (happy path): a single sender with no faults delivers every
/// packet through exactly one egress and leaves a balanced send/ack log.
#[tokio::test]
async fn happy_path_single_sender_no_faults() {
    let (controller, stats, _cancel_tx) = controller_with(1, 3, no_fault());
    let (_tx, cancel) = watch::channel(false);
    let tuple = ConnectionTuple::new(egress_common::ids::next_id(), 1, 9000, 443);
    let cfg = SenderConfig {
        size: 10,
        send_duration: Duration::from_millis(100),
    };

    let outcome = sender::run(cfg, tuple, stats.clone(), controller.clone(), cancel).await;

    assert!(outcome.completed);
    assert_eq!(outcome.last_acked_index, Some(9));
    assert_eq!(outcome.reconnects, 0);
    assert_eq!(controller.created_count(), 1);
    assert_eq!(stats.event_count(), 20);
}

/// Scenario 3 (destination block): several senders sharing one destination
/// reconnect away from an egress that blocks that destination, and the pool
/// grows in response to the resulting reconnect pressure.
#[tokio::test]
async fn blocked_destination_forces_reconnect_and_growth() {
    let fault = FaultConfig {
        block_probability_per_dst: 1.0,
        block_delay: Duration::from_millis(0),
        block_min: Duration::from_secs(60),
        block_max: Duration::from_secs(60),
        ..no_fault()
    };
    let (controller, stats, cancel_tx) = controller_with(1, 1, fault);
    let shared_dst = 9001;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let tuple = ConnectionTuple::new(egress_common::ids::next_id(), 1, shared_dst, 443);
        let cfg = SenderConfig {
            size: 50,
            send_duration: Duration::from_millis(200),
        };
        let (_tx, cancel_rx) = watch::channel(false);
        handles.push(tokio::spawn(sender::run(
            cfg,
            tuple,
            stats.clone(),
            controller.clone(),
            cancel_rx,
        )));
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    let _ = cancel_tx.send(true);
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(outcome.reconnects > 0, "senders behind a fully-blocked destination must reconnect");
    }
    assert!(controller.window_len() >= 1);
    assert!(controller.created_count() >= 1);
}

/// Scenario 5 (contract after expansion): forcing the window above
/// `min_window_size` and letting it sit quiet evicts exactly the weakest
/// performer, never dropping below the floor.
#[tokio::test]
async fn contraction_never_drops_below_floor_and_evicts_weakest() {
    let (controller, stats, _cancel_tx) = controller_with(2, 1, no_fault());
    let dst = ConnectionTuple::new(0, 0, 9002, 443);

    for src_port in 0..5u32 {
        stats.add_packet(egress_stats::PacketEvent::new(
            quanta::Instant::now(),
            1,
            1,
            ConnectionTuple::new(1, src_port, 9002, 443),
            1,
        ));
    }
    controller.choose_egress(dst);
    assert!(controller.window_len() > 2);

    let ids = controller.snapshot();
    let weakest = ids[0];
    for id in ids.iter().skip(1) {
        stats.add_packet(egress_stats::PacketEvent::new(
            quanta::Instant::now(),
            1,
            *id,
            dst,
            5_000,
        ));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    for _ in 0..10 {
        controller.contract_tick();
    }
    assert!(controller.window_len() >= 2, "never shrinks below min_window_size");
    assert!(!controller.snapshot().contains(&weakest));
}

/// Scenario 6 (cancellation): flipping the root cancellation signal makes
/// every in-flight sender return promptly with no completed outcome.
#[tokio::test]
async fn cancellation_stops_senders_promptly() {
    let (controller, stats, _ignored_cancel_tx) = controller_with(1, 3, no_fault());
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let tuple = ConnectionTuple::new(egress_common::ids::next_id(), 1, 9003, 443);
    let cfg = SenderConfig {
        size: 1_000_000,
        send_duration: Duration::from_secs(1000),
    };
    let handle = tokio::spawn(sender::run(cfg, tuple, stats, controller, cancel_rx));
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel_tx.send(true).unwrap();
    let outcome = tokio::time::timeout(Duration::from_millis(200), handle)
        .await
        .expect("sender must exit promptly after cancellation")
        .unwrap();
    assert!(!outcome.completed);
}
