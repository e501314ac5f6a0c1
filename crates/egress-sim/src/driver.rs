//! Wires the statistics window, hop-window controller, and concurrent
//! senders into one runnable simulation, and prints the spec's mandated
//! summary line (spec.md §6).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egress_common::config::SimConfig;
use egress_common::error::SimError;
use egress_common::ConnectionTuple;
use egress_core::controller::{Controller, ControllerConfig};
use egress_core::fault::FaultConfig;
use egress_core::sender::{self, SenderConfig, SenderOutcome};
use egress_stats::{BucketedWindow, EventLogWindow, StatsWindow};
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use tokio::sync::watch;

/// Result of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub senders_completed: usize,
    pub senders_total: usize,
    pub egresses_created: usize,
    pub events_logged: u64,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "senders completed: {}/{}, egresses created: {}, events logged: {}",
            self.senders_completed, self.senders_total, self.egresses_created, self.events_logged
        )
    }
}

fn fault_config(cfg: &SimConfig) -> FaultConfig {
    FaultConfig {
        drop_probability_per_second: cfg.drop_probability_per_second,
        drop_min: cfg.drop_min(),
        drop_max: cfg.drop_max(),
        block_probability_per_dst: cfg.block_probability_per_dst,
        block_delay: cfg.block_delay(),
        block_min: cfg.block_min(),
        block_max: cfg.block_max(),
    }
}

fn controller_config(cfg: &SimConfig) -> ControllerConfig {
    ControllerConfig {
        min_window_size: cfg.egress_window_size.max(1),
        stats_window: cfg.egress_stats_window(),
        reconnect_window: cfg.egress_stats_reconnect_window(),
        estimate_net_transfer: cfg.egress_stats_window_estimate_net_transfer,
        estimate_net_transfer_to_dst: cfg.egress_stats_window_estimate_net_transfer_to_dst,
        dst_weight: cfg.dst_weight,
        contract_timeout: cfg.egress_window_contract_timeout(),
        expand_reconnect_count: cfg.egress_window_expand_reconnect_count,
        expand_step: cfg.egress_window_expand_step,
    }
}

/// Spawn the background task that drives `Controller::contract_tick` on a
/// fixed cadence. Owned by the driver, not the controller, per spec.md
/// §4.F's note that the controller stays a plain synchronous lock-holder.
fn spawn_contract_ticker(
    controller: Arc<Controller>,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                result = cancel.changed() => {
                    if result.is_err() || *cancel.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    controller.contract_tick();
                }
            }
        }
    });
}

/// Run one simulation to completion, or return [`SimError::Timeout`] if
/// `cfg.timeout` elapses before every sender finishes (or is cancelled).
pub async fn run(cfg: SimConfig) -> anyhow::Result<Summary> {
    let stats: Arc<dyn StatsWindow> = if cfg.egress_stats_bucketed {
        Arc::new(BucketedWindow::new(
            cfg.packet_interval(),
            cfg.egress_stats_window()
                .max(cfg.egress_stats_reconnect_window()),
        ))
    } else {
        Arc::new(EventLogWindow::new())
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);

    let seed = cfg.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(seed, "seeding simulation RNG");
    let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));

    let controller = Controller::new(
        stats.clone(),
        controller_config(&cfg),
        fault_config(&cfg),
        rng,
        cancel_rx.clone(),
    );

    spawn_contract_ticker(
        controller.clone(),
        cfg.egress_window_contract_timeout(),
        cancel_rx.clone(),
    );

    // Every sender in one run targets the same destination. The spec's
    // external interface has no knob for a destination count, and a
    // single shared destination is enough to exercise per-destination
    // scoring, blocking, and reconnect-pressure counting end to end.
    let dst_addr = egress_common::ids::next_id();
    const DST_PORT: u32 = 443;

    let sender_cfg = SenderConfig {
        size: cfg.send_size,
        send_duration: cfg.send_duration(),
    };

    let mut handles = Vec::with_capacity(cfg.sender_count as usize);
    for i in 0..cfg.sender_count {
        let src_addr = egress_common::ids::next_id();
        let tuple = ConnectionTuple::new(src_addr, 1, dst_addr, DST_PORT);
        let stats = stats.clone();
        let controller = controller.clone();
        let cancel_rx = cancel_rx.clone();
        handles.push(tokio::spawn(async move {
            sender::run(sender_cfg, tuple, stats, controller, cancel_rx).await
        }));
        tracing::debug!(sender = i, src_addr, "sender spawned");
    }

    let senders_total = handles.len();
    let join_all = async move {
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.unwrap_or(SenderOutcome {
                completed: false,
                last_acked_index: None,
                reconnects: 0,
            }));
        }
        outcomes
    };

    let outcomes = tokio::select! {
        outcomes = join_all => outcomes,
        _ = tokio::time::sleep(cfg.timeout()) => {
            let _ = cancel_tx.send(true);
            return Err(SimError::Timeout.into());
        }
    };

    for (i, outcome) in outcomes.iter().enumerate() {
        tracing::info!(
            sender = i,
            completed = outcome.completed,
            last_acked = ?outcome.last_acked_index,
            reconnects = outcome.reconnects,
            "sender finished"
        );
    }

    let senders_completed = outcomes.iter().filter(|o| o.completed).count();
    Ok(Summary {
        senders_completed,
        senders_total,
        egresses_created: controller.created_count(),
        events_logged: stats.event_count(),
    })
}
