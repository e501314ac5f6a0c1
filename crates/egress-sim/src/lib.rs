//! The simulation driver (spec component G): wires the statistics
//! window, hop-window controller, and concurrent senders into one
//! runnable egress-selection simulation.

pub mod driver;

pub use driver::{run, Summary};
