//! deltafinder CLI - run the delta electron finder on event files
//!
//! Usage:
//!   deltafinder run <events.json> [--geometry <file>] [--config <file>] [--output <file>]
//!   deltafinder simulate <events.json> [--n-events <n>] [--seed <n>] [--evaluate]

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use deltafinder::io::{load_config, load_events, load_geometry, save_events, save_outputs};
use deltafinder::synthetic::{generate_events, SyntheticOpts};
use deltafinder::{DeltaFinder, DeltaFinderConfig, Result};
use trkcore::tracker::description::TrackerDescription;
use trkcore::tracker::geometry::TrackerGeometry;

#[derive(Parser)]
#[command(name = "deltafinder")]
#[command(about = "Delta electron finder for straw tracker hits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find delta electrons in the events of a file
    Run {
        /// Event file (JSON)
        events: PathBuf,

        /// Tracker description (JSON); the regular tracker if absent
        #[arg(short, long)]
        geometry: Option<PathBuf>,

        /// Finder configuration (JSON); defaults if absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full per-event results here (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stations of the regular tracker
        #[arg(long, default_value = "18")]
        stations: usize,
    },

    /// Write synthetic events
    Simulate {
        /// Output event file (JSON)
        output: PathBuf,

        #[arg(short, long, default_value = "10")]
        n_events: usize,

        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Delta electrons per event
        #[arg(long, default_value = "3")]
        n_deltas: usize,

        /// Noise hits per event
        #[arg(long, default_value = "40")]
        n_noise: usize,

        #[arg(long, default_value = "18")]
        stations: usize,

        /// Run the finder on the generated events and report the hit efficiency
        #[arg(long)]
        evaluate: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Run { events, geometry, config, output, stations } => {
            run_events(&events, geometry.as_deref(), config.as_deref(), output.as_deref(), stations)
        }
        Commands::Simulate { output, n_events, seed, n_deltas, n_noise, stations, evaluate } => {
            let opts = SyntheticOpts { n_deltas, n_noise, seed, ..Default::default() };
            simulate(&output, &opts, n_events, stations, evaluate)
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn regular_geometry(stations: usize) -> Result<TrackerGeometry> {
    Ok(TrackerGeometry::build(&TrackerDescription::regular(stations))?)
}

fn run_events(
    events: &Path,
    geometry: Option<&Path>,
    config: Option<&Path>,
    output: Option<&Path>,
    stations: usize,
) -> Result<()> {
    let geometry = match geometry {
        Some(path) => load_geometry(path)?,
        None => regular_geometry(stations)?,
    };
    let config = match config {
        Some(path) => load_config(path)?,
        None => DeltaFinderConfig::default(),
    };
    let finder = DeltaFinder::new(config, geometry)?;

    let events = load_events(events)?;
    info!("{} events, {} stations", events.len(), finder.geometry().n_stations());

    let mut outputs = Vec::with_capacity(events.len());
    let mut n_failed = 0;
    for (data, result) in events.iter().zip(finder.run_batch(&events)) {
        match result {
            Ok(out) => {
                let summary = serde_json::json!({
                    "event": out.event,
                    "n_hits": out.is_delta.len(),
                    "n_delta_hits": out.n_delta_hits(),
                    "candidates": out.candidates.iter().map(|dc| serde_json::json!({
                        "index": dc.index,
                        "stations": [dc.first_station, dc.last_station],
                        "n_seeds": dc.n_seeds,
                        "n_hits": dc.n_hits,
                        "center": dc.center,
                        "time": dc.mean_time,
                    })).collect::<Vec<_>>(),
                });
                println!("{}", summary);
                outputs.push(out);
            }
            Err(e) => {
                warn!("event {} skipped: {}", data.event, e);
                n_failed += 1;
            }
        }
    }

    let n_candidates: usize = outputs.iter().map(|o| o.candidates.len()).sum();
    info!("{} candidates in {} events, {} events failed", n_candidates, outputs.len(), n_failed);

    if let Some(path) = output {
        save_outputs(path, &outputs)?;
        info!("results written to {}", path.display());
    }
    Ok(())
}

fn simulate(output: &Path, opts: &SyntheticOpts, n_events: usize, stations: usize, evaluate: bool) -> Result<()> {
    let geometry = regular_geometry(stations)?;
    let events = generate_events(&geometry, opts, n_events);
    let data: Vec<_> = events.iter().map(|e| e.data.clone()).collect();
    save_events(output, &data)?;
    info!("{} events written to {}", events.len(), output.display());

    if !evaluate {
        return Ok(());
    }

    let finder = DeltaFinder::new(DeltaFinderConfig::default(), geometry)?;
    let (mut n_true, mut n_found, mut n_fake) = (0usize, 0usize, 0usize);
    for (ev, result) in events.iter().zip(finder.run_batch(&data)) {
        let out = result?;
        for (truth, &flagged) in ev.truth.iter().zip(out.is_delta.iter()) {
            match (truth.is_some(), flagged) {
                (true, true) => {
                    n_true += 1;
                    n_found += 1;
                }
                (true, false) => n_true += 1,
                (false, true) => n_fake += 1,
                (false, false) => {}
            }
        }
    }
    let efficiency = if n_true > 0 { n_found as f64 / n_true as f64 } else { 0.0 };
    info!("delta hits: {} of {} flagged ({:.3}), {} noise hits flagged", n_found, n_true, efficiency, n_fake);
    Ok(())
}
