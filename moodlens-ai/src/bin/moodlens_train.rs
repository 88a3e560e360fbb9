//! moodlens-train - Offline audio model training
//!
//! Reads a labeled dataset CSV, maps raw emotion labels onto the four moods,
//! cross-validates every candidate estimator and writes the selected pipeline
//! as a JSON model artifact.
//!
//! **Usage:**
//! ```bash
//! moodlens-train [--config FILE] [--dataset CSV] [--output MODEL] \
//!                [--mapped-output CSV] [--max-per-class N] [--seed N] [--split POLICY]
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use moodlens_ai::classifier::train_audio_model;
use moodlens_ai::dataset::{read_raw_frame, write_mapped_csv, LabeledDataset};
use moodlens_ai::logging::{init_tracing, log_build_info};
use moodlens_ai::normalizer::normalize_frame;
use moodlens_common::config::{ConfigResolver, SplitPolicy};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    /// 70/20/10 train/validation/test
    TrainValidationTest,
    /// 80/20 train/test
    TrainTest,
}

impl From<SplitArg> for SplitPolicy {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::TrainValidationTest => SplitPolicy::TrainValidationTest,
            SplitArg::TrainTest => SplitPolicy::TrainTest,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "moodlens-train", version, about = "Train the audio mood classifier")]
struct Args {
    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Labeled dataset CSV (default: [paths] dataset_csv)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Artifact output path (default: [paths] model_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the label-mapped dataset to this CSV
    #[arg(long, value_name = "CSV")]
    mapped_output: Option<PathBuf>,

    /// Per-class row cap; 0 disables downsampling
    #[arg(long)]
    max_per_class: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    split: Option<SplitArg>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.as_deref())
        .resolve()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;
    log_build_info("moodlens-train");

    if let Some(max) = args.max_per_class {
        config.training.max_per_class = max;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    if let Some(split) = args.split {
        config.training.split = split.into();
    }

    let dataset_path = args
        .dataset
        .unwrap_or_else(|| config.paths.dataset_path());
    let output = args.output.unwrap_or_else(|| config.paths.model_path.clone());

    info!("Dataset: {}", dataset_path.display());
    let raw = read_raw_frame(&dataset_path)
        .with_context(|| format!("Failed to read dataset {}", dataset_path.display()))?;
    let frame = normalize_frame(&raw);
    if !frame.dropped_columns.is_empty() {
        info!(columns = ?frame.dropped_columns, "Dropped leaking columns");
    }
    let unmapped = frame.unmapped_label_count();
    if unmapped > 0 {
        warn!(rows = unmapped, "Dropped rows with unmapped mood labels");
    }

    if let Some(mapped) = &args.mapped_output {
        write_mapped_csv(&frame, mapped)
            .with_context(|| format!("Failed to write {}", mapped.display()))?;
    }

    let dataset = LabeledDataset::from_frame(&frame).context("Dataset is not trainable")?;
    info!(
        rows = dataset.len(),
        features = ?dataset.feature_names(),
        classes = ?dataset.class_counts(),
        "Prepared labeled dataset"
    );
    if dataset.class_counts().len() < 2 {
        bail!(
            "Need at least two moods to train; labels remaining after filtering: {:?}",
            dataset.class_counts()
        );
    }

    let artifact = train_audio_model(&dataset, &config.training).context("Training failed")?;

    for candidate in &artifact.results.candidates {
        info!(
            "{:<22} CV {:.3} ± {:.3}  test {}",
            candidate.estimator.as_str(),
            candidate.cv_mean,
            candidate.cv_std,
            candidate
                .test_accuracy
                .map(|a| format!("{:.3}", a))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    for class in &artifact.results.classification_report {
        info!(
            mood = %class.mood,
            precision = class.precision,
            recall = class.recall,
            f1 = class.f1,
            support = class.support,
            "Test report"
        );
    }

    artifact
        .save(&output)
        .with_context(|| format!("Failed to write artifact {}", output.display()))?;
    info!(
        "Saved {} model to {}",
        artifact.results.selected.as_str(),
        output.display()
    );

    Ok(())
}
