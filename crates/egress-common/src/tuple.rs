//! Connection tuples: the four-field key identifying one logical
//! source/destination pairing.

use crate::ids::Id;
use serde::{Deserialize, Serialize};

/// Immutable `(src_addr, src_port, dst_addr, dst_port)` record.
///
/// `dst()` zeroes the source fields, yielding the canonical destination
/// key used for per-destination bucketing throughout the statistics
/// window and the hop-window controller. Two tuples that share
/// `(dst_addr, dst_port)` always produce `dst()` values that compare
/// equal, regardless of their source fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTuple {
    pub src_addr: Id,
    pub src_port: u32,
    pub dst_addr: Id,
    pub dst_port: u32,
}

impl ConnectionTuple {
    pub fn new(src_addr: Id, src_port: u32, dst_addr: Id, dst_port: u32) -> Self {
        ConnectionTuple {
            src_addr,
            src_port,
            dst_addr,
            dst_port,
        }
    }

    /// Swap source and destination fields.
    pub fn reverse(&self) -> Self {
        ConnectionTuple {
            src_addr: self.dst_addr,
            src_port: self.dst_port,
            dst_addr: self.src_addr,
            dst_port: self.src_port,
        }
    }

    /// Canonical destination key: source fields zeroed out.
    pub fn dst(&self) -> Self {
        ConnectionTuple {
            src_addr: 0,
            src_port: 0,
            dst_addr: self.dst_addr,
            dst_port: self.dst_port,
        }
    }

    /// Bump the source port by one, as a sender does on each reconnect.
    pub fn with_bumped_src_port(&self) -> Self {
        ConnectionTuple {
            src_port: self.src_port + 1,
            ..*self
        }
    }
}
