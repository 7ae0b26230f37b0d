#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the case enrichment toolchain.
//!
//! Geocodes case addresses, classifies cause-of-death narratives by drug
//! class, or both. Run without a subcommand for an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`case_enrich_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use case_enrich_case_models::AddressContext;
use case_enrich_pipeline::EnrichConfig;
use clap::{Args, Parser, Subcommand};

use crate::commands::GeocodeRequest;

#[derive(Parser)]
#[command(
    name = "case_enrich",
    about = "Geocode and classify medical examiner case tables"
)]
struct Cli {
    /// TOML config replacing the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct IoArgs {
    /// Input case table (CSV with a `casenumber` column)
    #[arg(long)]
    input: PathBuf,
    /// Output CSV; defaults to `<input>_enriched.csv`
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct GeocodeArgs {
    /// Which address to geocode: `incident` or `death`
    #[arg(long, default_value = "incident")]
    context: AddressContext,
    /// Maximum number of rows to look up (for testing)
    #[arg(long)]
    limit: Option<usize>,
    /// Lookups in flight at once (overrides the config)
    #[arg(long)]
    concurrency: Option<usize>,
}

impl From<GeocodeArgs> for GeocodeRequest {
    fn from(args: GeocodeArgs) -> Self {
        Self {
            context: args.context,
            limit: args.limit,
            concurrency: args.concurrency,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode rows missing latitude or longitude and add final coordinates
    Geocode {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        geocode: GeocodeArgs,
    },
    /// Flag drug classes in primary and secondary cause narratives
    Classify {
        #[command(flatten)]
        io: IoArgs,
    },
    /// Geocode and classify in one pass, writing a single merged table
    Run {
        #[command(flatten)]
        io: IoArgs,
        #[command(flatten)]
        geocode: GeocodeArgs,
    },
    /// List drug classes, their search terms, and composite rules
    Taxonomy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let multi = case_enrich_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = EnrichConfig::load(cli.config.as_deref())?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, &config).await;
    };

    match command {
        Commands::Geocode { io, geocode } => {
            let output = io
                .output
                .unwrap_or_else(|| commands::default_output(&io.input));
            commands::geocode(&multi, &config, &io.input, &output, &geocode.into()).await?;
        }
        Commands::Classify { io } => {
            let output = io
                .output
                .unwrap_or_else(|| commands::default_output(&io.input));
            commands::classify(&multi, &config, &io.input, &output)?;
        }
        Commands::Run { io, geocode } => {
            let output = io
                .output
                .unwrap_or_else(|| commands::default_output(&io.input));
            commands::run(&multi, &config, &io.input, &output, &geocode.into()).await?;
        }
        Commands::Taxonomy => commands::print_taxonomy(&config),
    }

    Ok(())
}
