//! Stop-and-wait request/ack client with adaptive RTT timeouts and
//! reconnect-on-failure.

use std::sync::Arc;
use std::time::Duration;

use egress_common::ConnectionTuple;
use egress_stats::{PacketEvent, StatsWindow};
use tokio::sync::{mpsc, watch};

use crate::controller::Controller;
use crate::packet::Packet;

/// Floors/ceilings clamping the adaptive RTT timers, per spec.md §4.E.
const SCHEDULER_EPOCH: Duration = Duration::from_millis(100);
const MAX_RTT: Duration = Duration::from_secs(1);

fn remaining(deadline: quanta::Instant, now: quanta::Instant) -> Duration {
    deadline.checked_duration_since(now).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy)]
pub struct SenderConfig {
    pub size: u32,
    pub send_duration: Duration,
}

/// What a sender run produced, for the driver's summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderOutcome {
    pub completed: bool,
    pub last_acked_index: Option<u64>,
    pub reconnects: u32,
}

/// Send `cfg.size` indexed packets through a chosen egress, restarting
/// the sequence from index 0 through a freshly chosen egress whenever
/// the current one goes quiet. Iterative, not recursive, so stack depth
/// is bounded regardless of reconnect count.
pub async fn run(
    cfg: SenderConfig,
    seed_tuple: ConnectionTuple,
    stats: Arc<dyn StatsWindow>,
    controller: Arc<Controller>,
    mut cancel: watch::Receiver<bool>,
) -> SenderOutcome {
    let delay = cfg.send_duration / cfg.size.max(1);
    let mut resend_timeout = delay.max(SCHEDULER_EPOCH);
    let mut read_timeout = resend_timeout * 2;
    let mut tuple = seed_tuple;
    let mut reconnects = 0u32;

    'reconnect: loop {
        if *cancel.borrow() {
            return SenderOutcome {
                completed: false,
                last_acked_index: None,
                reconnects,
            };
        }

        let egress = controller.choose_egress(tuple);
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Packet>();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<Packet>();
        egress.connect(tuple, out_rx, in_tx, cancel.clone());

        let mut last_acked: Option<u64> = None;
        let mut should_reconnect = false;
        let mut i: u64 = 0;

        while i < cfg.size as u64 {
            if *cancel.borrow() {
                drop(out_tx);
                return SenderOutcome {
                    completed: false,
                    last_acked_index: last_acked,
                    reconnects,
                };
            }

            let mut send_time = quanta::Instant::now();
            let read_deadline = send_time + read_timeout;
            let mut resend_deadline = send_time + resend_timeout;

            stats.add_packet(PacketEvent::new(send_time, tuple.src_addr, egress.id, tuple, 1));
            if out_tx.send(Packet { index: i }).is_err() {
                should_reconnect = true;
                break;
            }

            'wait: loop {
                let now = quanta::Instant::now();
                let read_wait = remaining(read_deadline, now);
                let resend_wait = remaining(resend_deadline, now);

                tokio::select! {
                    result = cancel.changed() => {
                        if result.is_err() || *cancel.borrow() {
                            drop(out_tx);
                            return SenderOutcome {
                                completed: false,
                                last_acked_index: last_acked,
                                reconnects,
                            };
                        }
                    }
                    _ = tokio::time::sleep(read_wait) => {
                        should_reconnect = true;
                        break 'wait;
                    }
                    _ = tokio::time::sleep(resend_wait) => {
                        send_time = quanta::Instant::now();
                        stats.add_packet(PacketEvent::new(send_time, tuple.src_addr, egress.id, tuple, 1));
                        let _ = out_tx.send(Packet { index: i });
                        resend_deadline = send_time + resend_timeout;
                    }
                    maybe_ack = in_rx.recv() => {
                        match maybe_ack {
                            None => {
                                should_reconnect = true;
                                break 'wait;
                            }
                            Some(ack) if ack.index == i => {
                                let ack_time = quanta::Instant::now();
                                stats.add_packet(PacketEvent::new(ack_time, egress.id, tuple.src_addr, tuple, 1));
                                let rtt = remaining(ack_time, send_time).clamp(SCHEDULER_EPOCH, MAX_RTT);
                                resend_timeout = rtt;
                                read_timeout = rtt * 2;
                                last_acked = Some(i);
                                i += 1;
                                break 'wait;
                            }
                            Some(_other) => {
                                // Wrong index: ignore and keep waiting.
                            }
                        }
                    }
                }
            }

            if should_reconnect {
                break;
            }

            tokio::select! {
                result = cancel.changed() => {
                    if result.is_err() || *cancel.borrow() {
                        drop(out_tx);
                        return SenderOutcome {
                            completed: false,
                            last_acked_index: last_acked,
                            reconnects,
                        };
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        drop(out_tx);

        if should_reconnect {
            reconnects += 1;
            tuple = tuple.with_bumped_src_port();
            tracing::debug!(reconnects, "sender reconnecting through a fresh egress");
            continue 'reconnect;
        }

        return SenderOutcome {
            completed: true,
            last_acked_index: last_acked,
            reconnects,
        };
    }
}
