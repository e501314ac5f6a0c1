//! Shared types for the egress-selection simulator.
//!
//! This crate contains:
//! - **ID generation** — a process-wide monotonic `Id` allocator
//! - **Config** — the simulation's tunable parameters, loadable from TOML
//! - **Errors** — the small set of error values the driver boundary matches on

pub mod config;
pub mod error;
pub mod ids;
pub mod tuple;

pub use ids::Id;
pub use tuple::ConnectionTuple;
