//! The egress actor: an in-process endpoint that echoes packets back to
//! whichever sender is connected to it, subject to drop and
//! destination-block fault injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use egress_common::{ConnectionTuple, Id};
use rand::rngs::StdRng;
use rand::RngExt as _;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::fault::{BlackholeInterval, FaultConfig};
use crate::packet::Packet;

/// Large enough that nothing in a bounded simulation run will ever wait
/// this long; substitutes for "wait indefinitely" in the connection
/// task's select loop.
pub const FOREVER: Duration = Duration::from_secs(3600);

struct EgressState {
    drop_interval: BlackholeInterval,
    block_by_dst: HashMap<ConnectionTuple, BlackholeInterval>,
}

/// A simulated exit node. Created on demand by the controller, lives
/// until the process shuts down; connections hold an `Arc` to it but own
/// nothing beyond their own channel handles.
pub struct Egress {
    pub id: Id,
    fault_cfg: FaultConfig,
    state: Arc<Mutex<EgressState>>,
    rng: Arc<Mutex<StdRng>>,
    ticker: JoinHandle<()>,
}

impl Egress {
    /// Spawn a new egress with its drop-evaluation ticker already running.
    pub fn spawn(
        id: Id,
        fault_cfg: FaultConfig,
        rng: Arc<Mutex<StdRng>>,
        cancel: watch::Receiver<bool>,
    ) -> Arc<Egress> {
        let state = Arc::new(Mutex::new(EgressState {
            drop_interval: BlackholeInterval::none(quanta::Instant::now()),
            block_by_dst: HashMap::new(),
        }));
        let ticker = tokio::spawn(drop_ticker(state.clone(), fault_cfg, rng.clone(), cancel));
        tracing::debug!(egress_id = id, "egress spawned");
        Arc::new(Egress {
            id,
            fault_cfg,
            state,
            rng,
            ticker,
        })
    }

    /// Accept packets on `inbox`, echo or discard per the fault model, and
    /// write acks onto `outbox`. Returns the task's `JoinHandle` so
    /// callers can confirm it exits once `inbox` closes.
    pub fn connect(
        self: &Arc<Self>,
        tuple: ConnectionTuple,
        inbox: mpsc::UnboundedReceiver<Packet>,
        outbox: mpsc::UnboundedSender<Packet>,
        cancel: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let egress = self.clone();
        tokio::spawn(connection_loop(egress, tuple, inbox, outbox, cancel))
    }

    /// One-shot roll for whether this egress blocks a given destination.
    /// Guarded by `Entry::or_insert_with` so it never re-fires for the
    /// same `(egress, dst_key)` pair, even after the interval lapses.
    fn maybe_block_per_dst(&self, dst_key: ConnectionTuple) -> BlackholeInterval {
        let mut state = self.state.lock().unwrap();
        *state.block_by_dst.entry(dst_key).or_insert_with(|| {
            let now = quanta::Instant::now();
            let mut rng = self.rng.lock().unwrap();
            if rng.random::<f64>() < self.fault_cfg.block_probability_per_dst {
                let delay = random_duration(&mut rng, Duration::ZERO, self.fault_cfg.block_delay);
                let len = random_duration(&mut rng, self.fault_cfg.block_min, self.fault_cfg.block_max);
                let start = now + delay;
                BlackholeInterval {
                    active: true,
                    start,
                    end: start + len,
                }
            } else {
                BlackholeInterval::none(now)
            }
        })
    }

    fn intervals_for(&self, dst_key: ConnectionTuple) -> (BlackholeInterval, BlackholeInterval) {
        let state = self.state.lock().unwrap();
        let drop_iv = state.drop_interval;
        let block_iv = state
            .block_by_dst
            .get(&dst_key)
            .copied()
            .unwrap_or_else(|| BlackholeInterval::none(quanta::Instant::now()));
        (drop_iv, block_iv)
    }
}

impl Drop for Egress {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

fn random_duration(rng: &mut StdRng, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    rng.random_range(min..max)
}

async fn drop_ticker(
    state: Arc<Mutex<EgressState>>,
    cfg: FaultConfig,
    rng: Arc<Mutex<StdRng>>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            result = cancel.changed() => {
                if result.is_err() || *cancel.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                let now = quanta::Instant::now();
                let mut guard = state.lock().unwrap();
                if guard.drop_interval.eligible_for_roll(now) {
                    let mut rng = rng.lock().unwrap();
                    if rng.random::<f64>() < cfg.drop_probability_per_second {
                        let len = random_duration(&mut rng, cfg.drop_min, cfg.drop_max);
                        guard.drop_interval = BlackholeInterval {
                            active: true,
                            start: now,
                            end: now + len,
                        };
                    }
                }
            }
        }
    }
}

async fn connection_loop(
    egress: Arc<Egress>,
    tuple: ConnectionTuple,
    mut inbox: mpsc::UnboundedReceiver<Packet>,
    outbox: mpsc::UnboundedSender<Packet>,
    mut cancel: watch::Receiver<bool>,
) {
    let dst_key = tuple.dst();
    egress.maybe_block_per_dst(dst_key);

    loop {
        if *cancel.borrow() {
            break;
        }
        let now = quanta::Instant::now();
        let (drop_iv, block_iv) = egress.intervals_for(dst_key);
        let wait = [
            drop_iv.next_transition(now),
            block_iv.next_transition(now),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(FOREVER);

        tokio::select! {
            result = cancel.changed() => {
                if result.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(wait) => {
                // A fault transitioned (or the wait simply lapsed); loop
                // around to re-read the current intervals.
            }
            maybe_packet = inbox.recv() => {
                match maybe_packet {
                    None => break,
                    Some(packet) => {
                        let now = quanta::Instant::now();
                        let (drop_iv, block_iv) = egress.intervals_for(dst_key);
                        if drop_iv.blocks(now) || block_iv.blocks(now) {
                            tracing::trace!(egress_id = egress.id, index = packet.index, "packet dropped");
                        } else if outbox.send(packet).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    drop(outbox);
}
