//! Simulation configuration.
//!
//! Every knob from the spec's external-interface table lives here as one
//! flat, serde-deserializable record, loadable from a TOML file and
//! overridable by CLI flags in the driver binary (see `egress-sim`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation wall-clock deadline, in milliseconds.
    pub timeout_ms: u64,
    /// Statistics bucket granularity, in milliseconds.
    pub packet_interval_ms: u64,
    /// Number of concurrent senders.
    pub sender_count: u32,
    /// Packets per sender sequence.
    pub send_size: u32,
    /// Target total duration of a sender's send sequence, in milliseconds.
    pub send_duration_ms: u64,
    /// Minimum egress pool size.
    pub egress_window_size: usize,
    /// Window used for scoring, in milliseconds.
    pub egress_stats_window_ms: u64,
    /// Window used for counting recent connection tuples per destination,
    /// in milliseconds.
    pub egress_stats_reconnect_window_ms: u64,
    /// Fallback score when an egress has no recorded global activity.
    pub egress_stats_window_estimate_net_transfer: f64,
    /// Fallback score when an egress has no recorded per-destination activity.
    pub egress_stats_window_estimate_net_transfer_to_dst: f64,
    /// Weight blending global vs per-destination score, in `[0, 1]`.
    pub dst_weight: f64,
    /// Minimum interval between contract evaluations / quiet period since
    /// last expansion, in milliseconds.
    pub egress_window_contract_timeout_ms: u64,
    /// Expansion formula: reconnects per expansion step.
    pub egress_window_expand_reconnect_count: usize,
    /// Expansion formula: egresses added per step.
    pub egress_window_expand_step: usize,
    /// Per-second probability that an egress rolls a new drop interval.
    pub drop_probability_per_second: f64,
    /// Minimum drop interval length, in milliseconds.
    pub drop_min_ms: u64,
    /// Maximum drop interval length, in milliseconds.
    pub drop_max_ms: u64,
    /// Probability that an egress blocks a freshly-seen destination.
    pub block_probability_per_dst: f64,
    /// Upper bound (exclusive) of the uniform delay before a block starts,
    /// in milliseconds.
    pub block_delay_ms: u64,
    /// Minimum block interval length, in milliseconds.
    pub block_min_ms: u64,
    /// Maximum block interval length, in milliseconds.
    pub block_max_ms: u64,
    /// Use the bucketed (bounded-memory) statistics window instead of the
    /// reference append-only event log.
    pub egress_stats_bucketed: bool,
    /// RNG seed; `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            timeout_ms: 30_000,
            packet_interval_ms: 1_000,
            sender_count: 4,
            send_size: 20,
            send_duration_ms: 2_000,
            egress_window_size: 2,
            egress_stats_window_ms: 10_000,
            egress_stats_reconnect_window_ms: 10_000,
            egress_stats_window_estimate_net_transfer: 1.0,
            egress_stats_window_estimate_net_transfer_to_dst: 1.0,
            dst_weight: 0.5,
            egress_window_contract_timeout_ms: 5_000,
            egress_window_expand_reconnect_count: 3,
            egress_window_expand_step: 1,
            drop_probability_per_second: 0.0,
            drop_min_ms: 5_000,
            drop_max_ms: 10_000,
            block_probability_per_dst: 0.0,
            block_delay_ms: 0,
            block_min_ms: 5_000,
            block_max_ms: 10_000,
            egress_stats_bucketed: false,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Load a config from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn timeout(&self) -> Duration {
        millis(self.timeout_ms)
    }

    pub fn packet_interval(&self) -> Duration {
        millis(self.packet_interval_ms)
    }

    pub fn send_duration(&self) -> Duration {
        millis(self.send_duration_ms)
    }

    pub fn egress_stats_window(&self) -> Duration {
        millis(self.egress_stats_window_ms)
    }

    pub fn egress_stats_reconnect_window(&self) -> Duration {
        millis(self.egress_stats_reconnect_window_ms)
    }

    pub fn egress_window_contract_timeout(&self) -> Duration {
        millis(self.egress_window_contract_timeout_ms)
    }

    pub fn drop_min(&self) -> Duration {
        millis(self.drop_min_ms)
    }

    pub fn drop_max(&self) -> Duration {
        millis(self.drop_max_ms)
    }

    pub fn block_delay(&self) -> Duration {
        millis(self.block_delay_ms)
    }

    pub fn block_min(&self) -> Duration {
        millis(self.block_min_ms)
    }

    pub fn block_max(&self) -> Duration {
        millis(self.block_max_ms)
    }
}
