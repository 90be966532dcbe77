use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use daleel::configuration::get_configuration;
use daleel::domain::catalog::Catalog;
use daleel::services::{estimate_worst_case_cost, run_research, PlacesClient};

// For the worst-case cost estimate: a fully paginated text search tops out
// at 60 results.
const MAX_RESULTS_PER_QUERY: usize = 60;

/// Researches points of interest around Ehden from the Places API and
/// writes the raw-places artifact.
#[derive(Parser)]
struct Args {
    /// Where to write the raw-places artifact
    #[arg(long, default_value = "data/raw-places.json")]
    out: PathBuf,
    /// Print the query plan and cost estimate without spending API calls
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let catalog = Catalog::new();

    if args.dry_run {
        println!("would run {} text searches:", catalog.queries.len());
        for query in catalog.queries {
            println!("  - {query}");
        }
        println!(
            "bounds: lat {}..{}, lng {}..{}",
            catalog.bounds.min_lat, catalog.bounds.max_lat, catalog.bounds.min_lng, catalog.bounds.max_lng
        );
        println!(
            "worst-case cost: ~${:.2}",
            estimate_worst_case_cost(catalog.queries.len(), MAX_RESULTS_PER_QUERY)
        );
        return Ok(());
    }

    let configuration = get_configuration().expect("Failed to read configuration.");
    let client = PlacesClient::new(configuration.google_places);

    let artifact = run_research(&client, &catalog).await?;

    if let Some(parent) = args.out.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&args.out, serde_json::to_string_pretty(&artifact)?)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    log::info!(
        "wrote {} places to {}",
        artifact.places.len(),
        args.out.display()
    );
    Ok(())
}
