//! Error values the driver boundary needs to match on.
//!
//! Everything else propagates as `anyhow::Error` — resends, reconnects,
//! and individual egress misbehavior are handled locally and never
//! surfaced as an error (see spec §7).

use std::fmt;

/// The only error kind that escapes the simulation to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// The configured wall-clock deadline elapsed before every sender
    /// finished (or was cancelled).
    Timeout,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Timeout => write!(f, "simulation deadline exceeded"),
        }
    }
}

impl std::error::Error for SimError {}
