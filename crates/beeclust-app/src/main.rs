//! Headless driver for BeeClust simulations.
//!
//! Loads a grid from its flat text-matrix form, runs a number of ticks, and
//! reports score and swarm statistics. Stands in for the interactive shells
//! that usually embed the engine.

use anyhow::{Context, Result};
use beeclust_core::{BeeClustConfig, Colony};
use beeclust_storage::{load_grid, save_grid};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "beeclust",
    version,
    about = "Simulate a BeeClust thermotactic swarm on a grid"
)]
struct Cli {
    /// Grid file: whitespace-separated integer matrix, one row per line.
    grid: PathBuf,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// RNG seed; overrides any seed carried by the configuration file.
    #[arg(long)]
    seed: Option<u64>,

    /// Optional JSON file with simulation parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log a progress line every N ticks; 0 disables progress logging.
    #[arg(long, default_value_t = 25)]
    report_interval: u64,

    /// Write the final grid back out to this path.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let grid = load_grid(&cli.grid)
        .with_context(|| format!("loading grid from {}", cli.grid.display()))?;

    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config from {}", path.display()))?;
            serde_json::from_str::<BeeClustConfig>(&text)
                .with_context(|| format!("parsing config from {}", path.display()))?
        }
        None => BeeClustConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }

    let mut colony = Colony::new(grid, config).context("constructing simulation")?;
    info!(
        rows = colony.grid().rows(),
        cols = colony.grid().cols(),
        bees = colony.agents().count(),
        score = colony.score(),
        "loaded grid"
    );

    for tick in 1..=cli.ticks {
        let moved = colony.tick();
        if cli.report_interval > 0 && tick % cli.report_interval == 0 {
            info!(tick, moved, score = colony.score(), "progress");
        }
    }

    let swarms = colony.swarms();
    info!(
        ticks = cli.ticks,
        score = colony.score(),
        swarms = swarms.len(),
        largest_swarm = swarms.iter().map(Vec::len).max().unwrap_or(0),
        "simulation complete"
    );

    if let Some(out) = &cli.out {
        save_grid(out, colony.grid())
            .with_context(|| format!("saving final grid to {}", out.display()))?;
        info!(path = %out.display(), "saved final grid");
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
