//! The packet-interval statistics window (spec component C).
//!
//! Two implementations share one trait:
//!
//! - [`EventLogWindow`] — an append-only `Vec<PacketEvent>` behind a
//!   single lock, scanned in full on every query. This is the reference
//!   behavior: simple, obviously correct, O(N) per query.
//! - [`BucketedWindow`] — a time-bucketed ring buffer (keyed by
//!   `packet_interval`) that aggregates per-bucket instead of storing raw
//!   events, bounding memory at the cost of up to one bucket of skew at
//!   the query-window boundary. This is the optimization the spec's Open
//!   Question gestures at.
//!
//! Both are safe to share across sender and egress tasks via `Arc`.

use egress_common::{ConnectionTuple, Id};
use quanta::Instant;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::event::PacketEvent;

/// The three windowed queries the controller and sender rely on.
pub trait StatsWindow: Send + Sync {
    /// Record a send or ack event. Append-only: never mutates prior events.
    fn add_packet(&self, event: PacketEvent);

    /// Total `size` of events addressed to `egress_id` within
    /// `[now - window, now)`.
    fn net_transfer(&self, egress_id: Id, window: Duration) -> u64;

    /// Same as [`Self::net_transfer`], additionally filtered to events
    /// whose `dst_key` matches.
    fn net_transfer_to_dst(&self, egress_id: Id, window: Duration, dst_key: ConnectionTuple) -> u64;

    /// The set of distinct source-side connection tuples that targeted
    /// `dst_key` within the window.
    fn connection_tuples_for_dst(
        &self,
        dst_key: ConnectionTuple,
        window: Duration,
    ) -> HashSet<ConnectionTuple>;

    /// Total events recorded over this window's lifetime (not windowed),
    /// for the driver's summary line.
    fn event_count(&self) -> u64;
}

// ─── EventLogWindow ─────────────────────────────────────────────────────────

/// Append-only event log, O(N) per query. The reference implementation
/// and the oracle the bucketed version is tested against.
pub struct EventLogWindow {
    events: Mutex<Vec<PacketEvent>>,
}

impl EventLogWindow {
    pub fn new() -> Self {
        EventLogWindow {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl Default for EventLogWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsWindow for EventLogWindow {
    fn add_packet(&self, event: PacketEvent) {
        debug_assert_eq!(event.dst_key, event.tuple.dst());
        tracing::trace!(dst_id = event.dst_id, size = event.size, "packet event logged");
        self.events.lock().unwrap().push(event);
    }

    fn net_transfer(&self, egress_id: Id, window: Duration) -> u64 {
        let now = Instant::now();
        let cutoff = now.checked_sub(window).unwrap_or(now);
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.dst_id == egress_id && e.event_time >= cutoff && e.event_time < now)
            .map(|e| e.size)
            .sum()
    }

    fn net_transfer_to_dst(&self, egress_id: Id, window: Duration, dst_key: ConnectionTuple) -> u64 {
        let now = Instant::now();
        let cutoff = now.checked_sub(window).unwrap_or(now);
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.dst_id == egress_id
                    && e.dst_key == dst_key
                    && e.event_time >= cutoff
                    && e.event_time < now
            })
            .map(|e| e.size)
            .sum()
    }

    fn connection_tuples_for_dst(
        &self,
        dst_key: ConnectionTuple,
        window: Duration,
    ) -> HashSet<ConnectionTuple> {
        let now = Instant::now();
        let cutoff = now.checked_sub(window).unwrap_or(now);
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.dst_key == dst_key && e.event_time >= cutoff && e.event_time < now)
            .map(|e| e.tuple)
            .collect()
    }

    fn event_count(&self) -> u64 {
        self.events.lock().unwrap().len() as u64
    }
}

// ─── BucketedWindow ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Bucket {
    totals_by_egress: HashMap<Id, u64>,
    totals_by_egress_dst: HashMap<(Id, ConnectionTuple), u64>,
    tuples_by_dst: HashMap<ConnectionTuple, HashSet<ConnectionTuple>>,
}

struct Inner {
    buckets: BTreeMap<u64, Bucket>,
}

/// Bounded-memory alternative to [`EventLogWindow`]: events are folded
/// into per-bucket running totals the instant they arrive, so the
/// window's footprint is `O(buckets retained)`, not `O(events ever
/// recorded)`.
pub struct BucketedWindow {
    inner: Mutex<Inner>,
    bucket_width: Duration,
    epoch: Instant,
    /// How many trailing buckets to retain. Chosen large enough to cover
    /// the widest window any caller queries with; older buckets are
    /// dropped on the next `add_packet` once a newer bucket is opened.
    retain_buckets: u64,
    /// Lifetime event count, independent of bucket eviction.
    total_events: AtomicU64,
}

impl BucketedWindow {
    pub fn new(bucket_width: Duration, retention: Duration) -> Self {
        assert!(bucket_width > Duration::ZERO, "bucket_width must be positive");
        let retain_buckets = (retention.as_secs_f64() / bucket_width.as_secs_f64())
            .ceil()
            .max(1.0) as u64
            + 1;
        BucketedWindow {
            inner: Mutex::new(Inner {
                buckets: BTreeMap::new(),
            }),
            bucket_width,
            epoch: Instant::now(),
            retain_buckets,
            total_events: AtomicU64::new(0),
        }
    }

    fn bucket_index(&self, t: Instant) -> u64 {
        let since_epoch = t.checked_duration_since(self.epoch).unwrap_or(Duration::ZERO);
        (since_epoch.as_nanos() / self.bucket_width.as_nanos().max(1)) as u64
    }

    fn min_index_for_window(&self, window: Duration) -> u64 {
        let now = Instant::now();
        let cutoff = now.checked_sub(window).unwrap_or(self.epoch);
        self.bucket_index(cutoff)
    }

    fn evict_old(&self, inner: &mut Inner, newest_idx: u64) {
        let floor = newest_idx.saturating_sub(self.retain_buckets);
        // BTreeMap::retain stabilized in 1.53; keeps only recent buckets.
        inner.buckets.retain(|&idx, _| idx > floor);
    }
}

impl StatsWindow for BucketedWindow {
    fn add_packet(&self, event: PacketEvent) {
        debug_assert_eq!(event.dst_key, event.tuple.dst());
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let idx = self.bucket_index(event.event_time);
        let mut inner = self.inner.lock().unwrap();
        {
            let bucket = inner.buckets.entry(idx).or_default();
            *bucket.totals_by_egress.entry(event.dst_id).or_insert(0) += event.size;
            *bucket
                .totals_by_egress_dst
                .entry((event.dst_id, event.dst_key))
                .or_insert(0) += event.size;
            bucket
                .tuples_by_dst
                .entry(event.dst_key)
                .or_default()
                .insert(event.tuple);
        }
        self.evict_old(&mut inner, idx);
    }

    fn net_transfer(&self, egress_id: Id, window: Duration) -> u64 {
        let min_idx = self.min_index_for_window(window);
        let inner = self.inner.lock().unwrap();
        inner
            .buckets
            .range(min_idx..)
            .map(|(_, b)| b.totals_by_egress.get(&egress_id).copied().unwrap_or(0))
            .sum()
    }

    fn net_transfer_to_dst(&self, egress_id: Id, window: Duration, dst_key: ConnectionTuple) -> u64 {
        let min_idx = self.min_index_for_window(window);
        let inner = self.inner.lock().unwrap();
        inner
            .buckets
            .range(min_idx..)
            .map(|(_, b)| {
                b.totals_by_egress_dst
                    .get(&(egress_id, dst_key))
                    .copied()
                    .unwrap_or(0)
            })
            .sum()
    }

    fn connection_tuples_for_dst(
        &self,
        dst_key: ConnectionTuple,
        window: Duration,
    ) -> HashSet<ConnectionTuple> {
        let min_idx = self.min_index_for_window(window);
        let inner = self.inner.lock().unwrap();
        let mut out = HashSet::new();
        for (_, bucket) in inner.buckets.range(min_idx..) {
            if let Some(tuples) = bucket.tuples_by_dst.get(&dst_key) {
                out.extend(tuples.iter().copied());
            }
        }
        out
    }

    fn event_count(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }
}
