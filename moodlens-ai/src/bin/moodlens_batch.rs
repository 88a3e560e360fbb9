//! moodlens-batch - Bulk audio + lyrics prediction
//!
//! Scores every row of a dataset with both models, reconciles them and
//! writes the prediction corpus CSV that the dashboard statistics read.
//! Rows that cannot be scored are counted and reported, never fatal.

use anyhow::{Context, Result};
use clap::Parser;
use moodlens_ai::classifier::ModelArtifact;
use moodlens_ai::dataset::read_raw_frame;
use moodlens_ai::logging::{init_tracing, log_build_info};
use moodlens_ai::normalizer::normalize_frame;
use moodlens_ai::service::{MoodService, RowOutcome};
use moodlens_ai::stats::StatsEngine;
use moodlens_common::config::ConfigResolver;
use std::path::PathBuf;
use tracing::{info, warn};

/// Failed rows listed individually before the summary
const MAX_REPORTED_FAILURES: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "moodlens-batch", version, about = "Predict moods for a whole dataset")]
struct Args {
    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV (default: [paths] dataset_csv)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Corpus output CSV (default: [paths] predictions_csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model artifact (default: [paths] model_path)
    #[arg(short, long)]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.as_deref())
        .resolve()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;
    log_build_info("moodlens-batch");

    if let Some(model) = args.model {
        config.paths.model_path = model;
    }
    let input = args.input.unwrap_or_else(|| config.paths.dataset_path());
    let output = args.output.unwrap_or_else(|| config.paths.predictions_path());

    let model = ModelArtifact::load(&config.paths.model_path).with_context(|| {
        format!(
            "Failed to load model artifact {}",
            config.paths.model_path.display()
        )
    })?;
    let thresholds = config.thresholds;
    let service = MoodService::new(config, Some(model), None);

    let raw = read_raw_frame(&input)
        .with_context(|| format!("Failed to read input {}", input.display()))?;
    let frame = normalize_frame(&raw);
    match &frame.lyrics_column {
        Some(column) => info!("Lyrics column: {}", column),
        None => warn!("No lyrics column found; lyrics predictions will be empty"),
    }

    let batch = service
        .write_predictions(&frame, &output)
        .context("Batch prediction failed")?;

    let failures = batch.outcomes.iter().filter_map(|o| match o {
        RowOutcome::Failed { row, reason } => Some((*row, reason)),
        RowOutcome::Verdict { .. } => None,
    });
    for (row, reason) in failures.take(MAX_REPORTED_FAILURES) {
        warn!(row, reason = %reason, "Row skipped");
    }
    info!(
        succeeded = batch.succeeded,
        failed = batch.failed,
        output = %output.display(),
        "Corpus written"
    );

    match StatsEngine::new(thresholds).compute(&batch.corpus_rows()) {
        Ok(stats) => info!(
            agree = stats.agreement.agree,
            total = stats.agreement.total,
            agree_pct = stats.agreement.agree_pct,
            "Audio/lyrics agreement"
        ),
        Err(e) => warn!("No agreement statistics: {}", e),
    }

    Ok(())
}
