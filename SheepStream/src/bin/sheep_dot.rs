//! Prints the graph of the stored sheep in Graphviz format
//!
//! Usage: `sheep-dot [FLOCK]`. Without argument the newest stored flock is
//! rendered. The store is only read, so a running SheepStream is unaffected.

use anyhow::{Context, Result};
use electricsheep::store::parse_sheep_path;
use electricsheep::{latest_flock, render_dot, ElectricSheepConfigExt, Sheep};
use sheepconfig::get_config;
use tracing::debug;

fn main() -> Result<()> {
    let config = get_config();
    sheepstream::init_logging(&config);

    let flock = match std::env::args().nth(1) {
        Some(arg) => Some(
            arg.parse::<u32>()
                .with_context(|| format!("Invalid flock number: {arg}"))?,
        ),
        None => None,
    };

    let directory = config.get_sheep_directory()?;
    let mut sheep: Vec<Sheep> = Vec::new();
    for entry in std::fs::read_dir(&directory).with_context(|| format!("Cannot read {directory}"))? {
        if let Some(s) = parse_sheep_path(entry?.path()) {
            sheep.push(s);
        }
    }

    let flock = flock.or_else(|| latest_flock(&sheep));
    debug!(count = sheep.len(), ?flock, "Rendering sheep graph");
    print!("{}", render_dot(&sheep, flock));
    Ok(())
}
