//! The hop-window controller: maintains the egress pool, expands it
//! under reconnect pressure, contracts it when oversized, and picks one
//! egress per connection by weighted sampling over throughput.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egress_common::ConnectionTuple;
use egress_stats::StatsWindow;
use rand::rngs::StdRng;
use rand::RngExt as _;
use tokio::sync::watch;

use crate::egress::Egress;
use crate::fault::FaultConfig;

/// Tunables the controller needs, lifted out of `SimConfig` by the
/// driver so this crate doesn't depend on `egress-sim`.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub min_window_size: usize,
    pub stats_window: Duration,
    pub reconnect_window: Duration,
    pub estimate_net_transfer: f64,
    pub estimate_net_transfer_to_dst: f64,
    pub dst_weight: f64,
    pub contract_timeout: Duration,
    pub expand_reconnect_count: usize,
    pub expand_step: usize,
}

struct PoolState {
    window: Vec<Arc<Egress>>,
    last_expand_time: quanta::Instant,
    created: usize,
}

/// Owns the egress pool. `choose_egress` and `contract_tick` are both
/// plain synchronous methods — no task is spawned internally, so the
/// pool stays trivially testable and the driver decides who drives
/// `contract_tick` (normally a `tokio::time::interval` ticker task).
pub struct Controller {
    pool: Mutex<PoolState>,
    stats: Arc<dyn StatsWindow>,
    cfg: ControllerConfig,
    fault_cfg: FaultConfig,
    rng: Arc<Mutex<StdRng>>,
    cancel: watch::Receiver<bool>,
}

impl Controller {
    pub fn new(
        stats: Arc<dyn StatsWindow>,
        cfg: ControllerConfig,
        fault_cfg: FaultConfig,
        rng: Arc<Mutex<StdRng>>,
        cancel: watch::Receiver<bool>,
    ) -> Arc<Controller> {
        assert!(cfg.min_window_size >= 1, "min_window_size must be at least 1");
        Arc::new(Controller {
            pool: Mutex::new(PoolState {
                window: Vec::new(),
                last_expand_time: quanta::Instant::now(),
                created: 0,
            }),
            stats,
            cfg,
            fault_cfg,
            rng,
            cancel,
        })
    }

    /// Expand the pool to meet the current reconnect-pressure target, then
    /// pick one member by weighted sampling over (global, per-destination)
    /// throughput. Always returns a member of the window; the window is
    /// never empty after this call returns.
    pub fn choose_egress(&self, tuple: ConnectionTuple) -> Arc<Egress> {
        let dst_key = tuple.dst();
        let reconnect_count = self
            .stats
            .connection_tuples_for_dst(dst_key, self.cfg.reconnect_window)
            .len();

        let mut pool = self.pool.lock().unwrap();
        self.expand_to_target(&mut pool, reconnect_count);
        self.weighted_pick(&pool.window, dst_key)
    }

    /// Evict exactly one egress — the smallest recent `net_transfer` —
    /// when the window is oversized and has been quiet long enough.
    /// Called externally on a `contract_timeout` cadence; never contacts
    /// the evicted egress, whose existing connections simply run out.
    pub fn contract_tick(&self) {
        let mut pool = self.pool.lock().unwrap();
        if pool.window.len() <= self.cfg.min_window_size {
            return;
        }
        let now = quanta::Instant::now();
        if now < pool.last_expand_time + self.cfg.contract_timeout {
            return;
        }
        let victim = pool
            .window
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| self.stats.net_transfer(e.id, self.cfg.stats_window))
            .map(|(idx, _)| idx);
        if let Some(idx) = victim {
            let evicted = pool.window.remove(idx);
            tracing::info!(egress_id = evicted.id, "egress evicted from pool");
        }
    }

    pub fn window_len(&self) -> usize {
        self.pool.lock().unwrap().window.len()
    }

    /// Snapshot of current member IDs, for tests and the driver summary.
    pub fn snapshot(&self) -> Vec<egress_common::Id> {
        self.pool.lock().unwrap().window.iter().map(|e| e.id).collect()
    }

    /// Total egresses created over the controller's lifetime, including
    /// ones since evicted. For the driver summary.
    pub fn created_count(&self) -> usize {
        self.pool.lock().unwrap().created
    }

    fn expand_to_target(&self, pool: &mut PoolState, reconnect_count: usize) {
        let steps = reconnect_count / self.cfg.expand_reconnect_count.max(1);
        let target = self.cfg.min_window_size + steps * self.cfg.expand_step;
        while pool.window.len() < target {
            let egress = Egress::spawn(
                egress_common::ids::next_id(),
                self.fault_cfg,
                self.rng.clone(),
                self.cancel.clone(),
            );
            tracing::info!(egress_id = egress.id, window_len = pool.window.len() + 1, "egress pool expanded");
            pool.window.push(egress);
            pool.last_expand_time = quanta::Instant::now();
            pool.created += 1;
        }
    }

    fn weighted_pick(&self, window: &[Arc<Egress>], dst_key: ConnectionTuple) -> Arc<Egress> {
        debug_assert!(!window.is_empty(), "window must be non-empty before selection");

        let t: Vec<f64> = window
            .iter()
            .map(|e| {
                let raw = self.stats.net_transfer(e.id, self.cfg.stats_window) as f64;
                if raw == 0.0 {
                    self.cfg.estimate_net_transfer
                } else {
                    raw
                }
            })
            .collect();
        let u: Vec<f64> = window
            .iter()
            .map(|e| {
                let raw = self
                    .stats
                    .net_transfer_to_dst(e.id, self.cfg.stats_window, dst_key) as f64;
                if raw == 0.0 {
                    self.cfg.estimate_net_transfer_to_dst
                } else {
                    raw
                }
            })
            .collect();
        let total_t: f64 = t.iter().sum();
        let total_u: f64 = u.iter().sum();
        let w = self.cfg.dst_weight;

        let r: f64 = self.rng.lock().unwrap().random();
        let mut cumulative = 0.0;
        for (i, egress) in window.iter().enumerate() {
            let global_share = if total_t > 0.0 { t[i] / total_t } else { 0.0 };
            let dst_share = if total_u > 0.0 { u[i] / total_u } else { 0.0 };
            cumulative += (1.0 - w) * global_share + w * dst_share;
            if r - cumulative <= 1e-9 {
                return egress.clone();
            }
        }
        window.last().expect("window is non-empty").clone()
    }
}
