#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for training the risk model and scoring candidate routes.
//!
//! `train` fits a bundle from an incident CSV and writes it to disk; `score`
//! and `rank` load a bundle plus the incident dataset, read candidate routes
//! from a JSON file, and print per-route danger scores (or the full ranked
//! route list as JSON, safest first). `info` dumps a bundle's metadata.

use std::fs;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use saferoute_incident::IncidentStore;
use saferoute_model::{ModelBundle, TrainConfig, train};
use saferoute_route::{Route, ScoringOptions, ServingState};

#[derive(Parser)]
#[command(name = "saferoute_cli", about = "Route danger scoring tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model bundle from an incident dataset
    Train {
        /// Incident CSV file ({Latitude, Longitude, Date, Time, "Crime Type"})
        #[arg(long)]
        data: String,
        /// Output path for the trained bundle
        #[arg(long)]
        out: String,
        /// Number of spatial clusters (k)
        #[arg(long, default_value = "5")]
        clusters: usize,
        /// Number of trees in the forest
        #[arg(long, default_value = "60")]
        trees: usize,
        /// Seed for all stochastic training steps
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Score candidate routes and print one line per route
    Score {
        #[command(flatten)]
        serving: ServingArgs,
    },
    /// Rank candidate routes and print them as JSON, safest first
    Rank {
        #[command(flatten)]
        serving: ServingArgs,
    },
    /// Print a bundle's version and schema metadata
    Info {
        /// Path to a trained bundle
        #[arg(long)]
        bundle: String,
    },
}

#[derive(clap::Args)]
struct ServingArgs {
    /// Path to a trained bundle
    #[arg(long)]
    bundle: String,
    /// Incident CSV file (the snapshot the bundle serves against)
    #[arg(long)]
    data: String,
    /// Candidate routes JSON file (array of routes)
    #[arg(long)]
    routes: String,
    /// Route start time, e.g. "2024-06-10 22:30" (defaults to now)
    #[arg(long)]
    start: Option<String>,
    /// Use the deprecated plain-mean aggregation instead of the
    /// severity-weighted one
    #[arg(long)]
    mean: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            out,
            clusters,
            trees,
            seed,
        } => {
            let store = IncidentStore::load_csv(&data)?;
            log::info!(
                "Loaded {} incidents ({} rows skipped)",
                store.len(),
                store.skipped()
            );

            let config = TrainConfig {
                clusters,
                seed,
                forest: saferoute_model::ForestConfig {
                    trees,
                    seed,
                    ..saferoute_model::ForestConfig::default()
                },
                ..TrainConfig::default()
            };
            let (bundle, evaluation) = train(&store, &config)?;
            bundle.save(&out)?;
            log::info!("Bundle written to {out}");
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Commands::Score { serving } => {
            let (state, routes, start_time, options) = load_serving(&serving)?;
            for (i, route) in routes.iter().enumerate() {
                let score = state.score_route(route, start_time, &options);
                let distance = if route.distance_meters > 0.0 {
                    route.distance_meters
                } else {
                    route.path_length_meters()
                };
                println!(
                    "route {i}: danger {:.2}% ({} points, {distance:.0} m)",
                    score * 100.0,
                    route.coordinates.len()
                );
            }
        }
        Commands::Rank { serving } => {
            let (state, routes, start_time, options) = load_serving(&serving)?;
            let ranked = state.rank(&routes, start_time, &options);
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
        Commands::Info { bundle } => {
            let bundle = ModelBundle::load(&bundle)?;
            println!("version:  {}", bundle.version);
            println!("schema:   {}", bundle.schema.version());
            println!("features: {}", bundle.schema.fields().join(", "));
            println!("clusters: {}", bundle.kmeans.k());
            println!("trees:    {}", bundle.forest.len());
            println!(
                "hotspot:  ({:.5}, {:.5})",
                bundle.hotspot[0], bundle.hotspot[1]
            );
        }
    }

    Ok(())
}

fn load_serving(
    args: &ServingArgs,
) -> Result<(ServingState, Vec<Route>, NaiveDateTime, ScoringOptions), Box<dyn std::error::Error>>
{
    let bundle = ModelBundle::load(&args.bundle)?;
    let store = IncidentStore::load_csv(&args.data)?;
    log::info!(
        "Loaded {} incidents ({} rows skipped)",
        store.len(),
        store.skipped()
    );

    let routes: Vec<Route> = serde_json::from_str(&fs::read_to_string(&args.routes)?)?;
    let start_time = match &args.start {
        Some(value) => parse_start(value)?,
        None => Local::now().naive_local(),
    };
    let options = ScoringOptions {
        weighted: !args.mean,
    };

    Ok((ServingState::new(store, bundle), routes, start_time, options))
}

fn parse_start(value: &str) -> Result<NaiveDateTime, Box<dyn std::error::Error>> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    Err(format!("unable to parse start time {value:?}; use \"YYYY-MM-DD HH:MM\"").into())
}
