//! # egress-stats
//!
//! The packet-interval statistics window: an append-only event log that
//! answers windowed aggregate queries about which egresses are moving
//! bytes, globally and per destination.
//!
//! - [`event`] — the `PacketEvent` record every send/ack is logged as
//! - [`window`] — the `StatsWindow` trait and its two implementations

pub mod event;
pub mod window;

pub use event::PacketEvent;
pub use window::{BucketedWindow, EventLogWindow, StatsWindow};
