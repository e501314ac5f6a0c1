//! `egress-sim` — driver binary for the egress-selection simulator.
//!
//! Loads an optional TOML config, layers CLI overrides on top (mirroring
//! `strata-agent`'s `Cli`-overlays-config pattern), runs one simulation,
//! and prints the summary line mandated by spec.md §6.

use std::path::PathBuf;

use clap::Parser;
use egress_common::config::SimConfig;
use egress_common::error::SimError;
use tracing_subscriber::EnvFilter;

/// Egress-selection simulator driver.
#[derive(Parser, Debug)]
#[command(name = "egress-sim", about = "Discrete-event egress-selection simulator")]
struct Cli {
    /// Path to a TOML config file. CLI flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of concurrent senders.
    #[arg(long)]
    sender_count: Option<u32>,

    /// Simulation wall-clock deadline, in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// RNG seed; omit to seed from system entropy.
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(cli: &Cli) -> anyhow::Result<SimConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            SimConfig::from_toml_str(&raw)?
        }
        None => SimConfig::default(),
    };
    if let Some(sender_count) = cli.sender_count {
        cfg.sender_count = sender_count;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        cfg.timeout_ms = timeout_ms;
    }
    if cli.seed.is_some() {
        cfg.seed = cli.seed;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    tracing::info!(?cfg, "starting egress-selection simulation");

    match egress_sim::driver::run(cfg).await {
        Ok(summary) => {
            println!("{summary}");
            Ok(())
        }
        Err(err) => {
            eprintln!("simulation failed: {err}");
            if err.downcast_ref::<SimError>().is_some() {
                std::process::exit(1);
            }
            Err(err)
        }
    }
}
