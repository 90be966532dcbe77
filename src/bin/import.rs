use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use daleel::cli::parse_percentile;
use daleel::configuration::{get_configuration, Settings};
use daleel::domain::import::ManualPlace;
use daleel::domain::place::ScoredArtifact;
use daleel::services::{run_import, run_revert, ImportOptions, PlacesClient};

/// Imports the top scored places (plus the curated manual list) into the
/// destination store, replacing the currently active rows reversibly.
#[derive(Parser)]
struct Args {
    /// Share of scored places to import; defaults to the artifact's value
    #[arg(long, value_parser = parse_percentile)]
    percentile: Option<u8>,
    /// Scored-places artifact to import
    #[arg(long = "in", default_value = "data/scored-places.json")]
    input: PathBuf,
    /// Curated manual-places list (optional)
    #[arg(long, default_value = "data/manual-places.json")]
    manual: PathBuf,
    /// Compute everything, print a sample row and counts, mutate nothing
    #[arg(long)]
    dry_run: bool,
    /// Skip deactivating the currently active rows
    #[arg(long)]
    keep_existing: bool,
    /// Restore the pre-import hand-curated state instead of importing
    #[arg(long)]
    revert: bool,
}

fn pool_for(configuration: &Settings) -> PgPool {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(configuration.database.with_db())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let configuration = get_configuration().expect("Failed to read configuration.");

    if args.revert {
        if args.dry_run {
            println!(
                "dry run: would set active=true on rows with source='manual' \
                 and active=false on all others, in both tables"
            );
            return Ok(());
        }
        return run_revert(&pool_for(&configuration)).await;
    }

    let raw = fs::read_to_string(&args.input).with_context(|| {
        format!(
            "failed to read {}; run the score stage first",
            args.input.display()
        )
    })?;
    let artifact: ScoredArtifact =
        serde_json::from_str(&raw).context("the scored-places artifact is not valid JSON")?;

    let manual: Vec<ManualPlace> = match fs::read_to_string(&args.manual) {
        Ok(raw) => serde_json::from_str(&raw).context("the manual-places list is not valid JSON")?,
        Err(_) => {
            log::info!("no manual-places list at {}", args.manual.display());
            Vec::new()
        }
    };

    let client = PlacesClient::new(configuration.google_places.clone());
    let options = ImportOptions {
        percentile: args.percentile,
        dry_run: args.dry_run,
        keep_existing: args.keep_existing,
    };
    let pool = if args.dry_run {
        None
    } else {
        Some(pool_for(&configuration))
    };

    run_import(artifact, manual, &options, &client, pool.as_ref()).await
}
