//! The single event type the statistics window ingests.

use egress_common::{ConnectionTuple, Id};
use quanta::Instant;

/// One recorded send or ack, as described by the spec's "semantics of
/// delivered": a send event (`src = client`, `dst = egress`) records an
/// attempt, an ack event (`src = egress`, `dst = client`) records a
/// success. `net_transfer` intentionally counts *attempts* addressed to
/// an egress, not just acked bytes — see the crate-level docs.
#[derive(Debug, Clone, Copy)]
pub struct PacketEvent {
    pub event_time: Instant,
    pub src_id: Id,
    pub dst_id: Id,
    pub tuple: ConnectionTuple,
    /// Always `tuple.dst()` — kept as a field rather than recomputed on
    /// every scan, and checked against that invariant in tests.
    pub dst_key: ConnectionTuple,
    pub size: u64,
}

impl PacketEvent {
    pub fn new(event_time: Instant, src_id: Id, dst_id: Id, tuple: ConnectionTuple, size: u64) -> Self {
        PacketEvent {
            event_time,
            src_id,
            dst_id,
            tuple,
            dst_key: tuple.dst(),
            size,
        }
    }
}
