use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use daleel::cli::parse_percentile;
use daleel::domain::place::ResearchArtifact;
use daleel::services::{render_report, score_places, tiers};

/// Scores a raw-places artifact with a Bayesian average and writes the
/// scored artifact plus the Markdown tier report.
#[derive(Parser)]
struct Args {
    /// Share of places in the top tier, in whole percent
    #[arg(long, value_parser = parse_percentile, default_value_t = 30)]
    percentile: u8,
    /// Raw-places artifact to score
    #[arg(long = "in", default_value = "data/raw-places.json")]
    input: PathBuf,
    /// Where to write the scored artifact
    #[arg(long, default_value = "data/scored-places.json")]
    out: PathBuf,
    /// Where to write the tier report
    #[arg(long, default_value = "reports/tier-report.md")]
    report: PathBuf,
    /// Print tier counts without writing any file
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}; run the research stage first", args.input.display()))?;
    let artifact: ResearchArtifact =
        serde_json::from_str(&raw).context("the raw-places artifact is not valid JSON")?;

    let scored = score_places(artifact, args.percentile)?;
    let t = tiers(&scored.places, scored.percentile);
    log::info!(
        "scored {} places (prior {:.3}): top {} / middle {} / bottom {}",
        scored.places.len(),
        scored.global_avg_rating,
        t.top.len(),
        t.middle.len(),
        t.bottom.len()
    );

    if args.dry_run {
        println!(
            "dry run: top {} / middle {} / bottom {} of {} places, nothing written",
            t.top.len(),
            t.middle.len(),
            t.bottom.len(),
            scored.places.len()
        );
        return Ok(());
    }

    for path in [&args.out, &args.report] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(&args.out, serde_json::to_string_pretty(&scored)?)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    fs::write(&args.report, render_report(&scored))
        .with_context(|| format!("failed to write {}", args.report.display()))?;

    log::info!(
        "wrote {} and {}",
        args.out.display(),
        args.report.display()
    );
    Ok(())
}
