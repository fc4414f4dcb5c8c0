#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the geotrack engine.
//!
//! `replay` runs a recorded fix log through a [`TrackingService`] built
//! from a TOML entity config, then prints statistics and geofence status
//! and writes route exports. `distance` is a quick great-circle check.
//!
//! [`TrackingService`]: geotrack_tracking::TrackingService

mod config;
mod distance;
mod error;
mod fixes;
mod replay;
mod snapshot;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geotrack_tracking::ExportFormat;

use crate::replay::ReplayOptions;

#[derive(Parser)]
#[command(name = "geotrack", about = "Location tracking and geofencing toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV log of fixes through the tracking engine
    Replay {
        /// TOML file with `[settings]` and `[[entities]]` tables
        #[arg(long)]
        config: PathBuf,
        /// CSV file of fixes (`entity_id,timestamp,latitude,longitude,...`)
        #[arg(long)]
        fixes: PathBuf,
        /// Walker recorded on every replayed route (overrides the config)
        #[arg(long)]
        walker: Option<String>,
        /// Export format: gpx, json or csv
        #[arg(long, default_value = "gpx")]
        format: ExportFormat,
        /// Number of most recent routes to export per entity (0 = all)
        #[arg(long, default_value = "0")]
        last: usize,
        /// Directory to write one export per entity into. Prints to
        /// stdout if not set.
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON snapshot file loaded before and saved after the replay
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print the great-circle distance and initial bearing between two points
    Distance {
        /// Start latitude
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        /// Start longitude
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        /// End latitude
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        /// End longitude
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            fixes,
            walker,
            format,
            last,
            output,
            snapshot,
        } => {
            replay::run(ReplayOptions {
                config,
                fixes,
                walker,
                format,
                last,
                output,
                snapshot,
            })
            .await?;
        }
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => {
            let (meters, bearing) = distance::measure(lat1, lon1, lat2, lon2)?;
            println!("Distance: {meters:.1} m ({:.3} km)", meters / 1000.0);
            println!("Bearing:  {bearing:.1}°");
        }
    }

    Ok(())
}
