//! Offline training and model selection
//!
//! 1. Cap each class (`max_per_class`, seeded)
//! 2. Stratified split (70/20/10 or 80/20)
//! 3. Stratified k-fold CV of every candidate on the training partition
//! 4. Select the highest CV mean; the first registered candidate wins ties
//! 5. Report validation and test accuracy for every candidate, plus a
//!    per-class report and confusion matrix for the selected one
//!
//! Test accuracy is reported but never consulted by the selection rule.

use chrono::Utc;
use moodlens_common::config::{SplitPolicy, TrainingConfig};
use moodlens_common::numeric::sanitize_unit;
use moodlens_common::{Error, Mood, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{EstimatorKind, FittedPipeline, ModelArtifact, ARTIFACT_VERSION};
use crate::dataset::{split_dataset, stratified_kfold, LabeledDataset};

/// Scores for one candidate estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub estimator: EstimatorKind,
    pub cv_scores: Vec<f64>,
    pub cv_mean: f64,
    pub cv_std: f64,
    /// `None` when the split has no validation partition
    pub validation_accuracy: Option<f64>,
    pub test_accuracy: Option<f64>,
}

/// Precision/recall/F1 for one class on the test partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub mood: Mood,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Rows = true label, columns = predicted label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<Mood>,
    pub counts: Vec<Vec<usize>>,
}

/// Stored in the artifact as `results`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub selected: EstimatorKind,
    pub candidates: Vec<CandidateReport>,
    pub split: SplitPolicy,
    pub seed: u64,
    pub max_per_class: usize,
    pub class_counts: BTreeMap<Mood, usize>,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
    pub classification_report: Vec<ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

/// Train every registered candidate and package the selected one
pub fn train_audio_model(
    dataset: &LabeledDataset,
    config: &TrainingConfig,
) -> Result<ModelArtifact> {
    train_with_candidates(dataset, config, &EstimatorKind::CANDIDATES)
}

/// Same as [`train_audio_model`] with an explicit candidate list (in priority order)
pub fn train_with_candidates(
    dataset: &LabeledDataset,
    config: &TrainingConfig,
    candidates: &[EstimatorKind],
) -> Result<ModelArtifact> {
    config.validate()?;
    if candidates.is_empty() {
        return Err(Error::Model("No candidate estimators registered".to_string()));
    }

    let sampled = dataset.balanced_downsample(config.max_per_class, config.seed);
    let class_counts = sampled.class_counts();
    if class_counts.len() < 2 {
        return Err(Error::Model(format!(
            "Need at least two moods to train, found {:?} after filtering",
            class_counts
        )));
    }

    let labels = Mood::sorted_labels()
        .into_iter()
        .filter(|m| class_counts.contains_key(m))
        .collect::<Vec<_>>();
    let y: Vec<usize> = sampled
        .labels
        .iter()
        .map(|m| labels.iter().position(|l| l == m).unwrap_or_default())
        .collect();
    let n_features = sampled.features.len();
    let n_classes = labels.len();

    let split = split_dataset(&sampled.labels, config.split, config.seed);
    let pick_rows = |idx: &[usize]| {
        idx.iter()
            .map(|&i| sampled.rows[i].clone())
            .collect::<Vec<_>>()
    };
    let pick_y = |idx: &[usize]| idx.iter().map(|&i| y[i]).collect::<Vec<_>>();
    let (train_x, train_y) = (pick_rows(&split.train), pick_y(&split.train));
    let (val_x, val_y) = (pick_rows(&split.validation), pick_y(&split.validation));
    let (test_x, test_y) = (pick_rows(&split.test), pick_y(&split.test));

    info!(
        features = ?sampled.feature_names(),
        classes = ?class_counts,
        train = train_y.len(),
        validation = val_y.len(),
        test = test_y.len(),
        "Training audio mood classifier"
    );

    let folds = stratified_kfold(
        &pick_labels(&sampled.labels, &split.train),
        config.cv_folds,
        config.seed,
    )?;

    let mut reports = Vec::with_capacity(candidates.len());
    let mut fitted = Vec::with_capacity(candidates.len());
    for &kind in candidates {
        let cv_scores: Vec<f64> = folds
            .par_iter()
            .map(|(fold_train, fold_val)| {
                let fx: Vec<_> = fold_train.iter().map(|&i| train_x[i].clone()).collect();
                let fy: Vec<_> = fold_train.iter().map(|&i| train_y[i]).collect();
                let pipeline = FittedPipeline::fit(kind, &fx, &fy, n_features, n_classes, config);
                let predicted: Vec<usize> =
                    fold_val.iter().map(|&i| pipeline.predict_index(&train_x[i])).collect();
                let truth: Vec<usize> = fold_val.iter().map(|&i| train_y[i]).collect();
                accuracy(&predicted, &truth).unwrap_or(0.0)
            })
            .collect();
        let (cv_mean, cv_std) = mean_std(&cv_scores);

        let pipeline = FittedPipeline::fit(kind, &train_x, &train_y, n_features, n_classes, config);
        let validation_accuracy = evaluate(&pipeline, &val_x, &val_y);
        let test_accuracy = evaluate(&pipeline, &test_x, &test_y);

        info!(
            estimator = kind.as_str(),
            cv_mean,
            cv_std,
            validation_accuracy = ?validation_accuracy,
            test_accuracy = ?test_accuracy,
            "Candidate evaluated"
        );

        reports.push(CandidateReport {
            estimator: kind,
            cv_scores,
            cv_mean,
            cv_std,
            validation_accuracy,
            test_accuracy,
        });
        fitted.push(pipeline);
    }

    let best = select_best(&reports);
    let selected = reports[best].estimator;
    let pipeline = fitted.swap_remove(best);
    info!(
        estimator = selected.as_str(),
        cv_mean = reports[best].cv_mean,
        "Selected model"
    );

    let test_predicted: Vec<usize> = test_x.iter().map(|r| pipeline.predict_index(r)).collect();
    let truth_moods: Vec<Mood> = test_y.iter().map(|&c| labels[c]).collect();
    let predicted_moods: Vec<Mood> = test_predicted.iter().map(|&c| labels[c]).collect();
    if truth_moods.is_empty() {
        warn!("Test partition is empty; classification report will be empty");
    }
    let test_labels: Vec<Mood> = labels
        .iter()
        .copied()
        .filter(|m| truth_moods.contains(m))
        .collect();

    let results = TrainingReport {
        selected,
        candidates: reports,
        split: config.split,
        seed: config.seed,
        max_per_class: config.max_per_class,
        class_counts,
        train_rows: train_y.len(),
        validation_rows: val_y.len(),
        test_rows: test_y.len(),
        classification_report: classification_report(&test_labels, &truth_moods, &predicted_moods),
        confusion_matrix: confusion_matrix(&truth_moods, &predicted_moods),
    };

    let artifact = ModelArtifact {
        version: ARTIFACT_VERSION.to_string(),
        pipeline,
        features: sampled.features.clone(),
        labels,
        results,
        trained_at: Utc::now(),
        build: Some(format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))),
    };
    artifact.validate()?;
    Ok(artifact)
}

fn pick_labels(labels: &[Mood], indices: &[usize]) -> Vec<Mood> {
    indices.iter().map(|&i| labels[i]).collect()
}

fn evaluate(pipeline: &FittedPipeline, x: &[Vec<Option<f64>>], y: &[usize]) -> Option<f64> {
    let predicted: Vec<usize> = x.iter().map(|r| pipeline.predict_index(r)).collect();
    accuracy(&predicted, y)
}

/// Index of the highest CV mean; strictly greater wins, so earlier candidates keep ties
pub fn select_best(reports: &[CandidateReport]) -> usize {
    let mut best = 0;
    for (i, report) in reports.iter().enumerate().skip(1) {
        if report.cv_mean > reports[best].cv_mean {
            best = i;
        }
    }
    best
}

/// Share of exact matches; `None` for empty input
pub fn accuracy<T: PartialEq>(predicted: &[T], truth: &[T]) -> Option<f64> {
    if truth.is_empty() || predicted.len() != truth.len() {
        return None;
    }
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    Some(correct as f64 / truth.len() as f64)
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Per-class precision, recall and F1. Undefined ratios are reported as 0.
pub fn classification_report(
    labels: &[Mood],
    truth: &[Mood],
    predicted: &[Mood],
) -> Vec<ClassMetrics> {
    labels
        .iter()
        .map(|&mood| {
            let pairs = truth.iter().zip(predicted);
            let tp = pairs.clone().filter(|(t, p)| **t == mood && **p == mood).count();
            let predicted_pos = predicted.iter().filter(|p| **p == mood).count();
            let support = truth.iter().filter(|t| **t == mood).count();

            let ratio = |num: usize, den: usize| {
                if den == 0 {
                    0.0
                } else {
                    num as f64 / den as f64
                }
            };
            let precision = ratio(tp, predicted_pos);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                mood,
                precision: sanitize_unit(precision),
                recall: sanitize_unit(recall),
                f1: sanitize_unit(f1),
                support,
            }
        })
        .collect()
}

/// Confusion matrix over the labels that occur in either list
pub fn confusion_matrix(truth: &[Mood], predicted: &[Mood]) -> ConfusionMatrix {
    let labels: Vec<Mood> = Mood::sorted_labels()
        .into_iter()
        .filter(|m| truth.contains(m) || predicted.contains(m))
        .collect();
    let mut counts = vec![vec![0usize; labels.len()]; labels.len()];
    for (t, p) in truth.iter().zip(predicted) {
        if let (Some(row), Some(col)) = (
            labels.iter().position(|l| l == t),
            labels.iter().position(|l| l == p),
        ) {
            counts[row][col] += 1;
        }
    }
    ConfusionMatrix { labels, counts }
}
