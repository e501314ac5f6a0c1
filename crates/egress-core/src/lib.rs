//! Egress actor, sender protocol, and hop-window controller.
//!
//! - [`fault`] — the blackhole-interval fault model shared by the egress
//! - [`packet`] — the one-field wire unit
//! - [`egress`] — the in-process endpoint with drop/block injection
//! - [`sender`] — the stop-and-wait client
//! - [`controller`] — pool expansion/contraction and weighted selection

pub mod controller;
pub mod egress;
pub mod fault;
pub mod packet;
pub mod sender;

pub use controller::{Controller, ControllerConfig};
pub use egress::Egress;
pub use fault::{BlackholeInterval, FaultConfig, FaultState};
pub use packet::Packet;
pub use sender::{SenderConfig, SenderOutcome};
