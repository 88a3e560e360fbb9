//! Audio Mood Classifier
//!
//! A fitted pipeline is impute → scale → estimate. The estimator is one of a
//! closed set of families, stored as a tagged enum so a serialized artifact
//! names exactly what it contains.
//!
//! **Artifact format:** JSON, `{version, pipeline, features, labels, results,
//! trained_at, build}`. `features` fixes the column order used at inference
//! time; `labels` decodes class indices back to moods. Both are captured at
//! training time and never re-derived.

pub mod forest;
pub mod knn;
pub mod logistic;
pub mod preprocess;
pub mod training;

use chrono::{DateTime, Utc};
use moodlens_common::config::TrainingConfig;
use moodlens_common::{Error, Mood, Prediction, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::normalizer::{Feature, FeatureRecord};
use forest::{ForestParams, RandomForest};
use knn::KNearestNeighbors;
use logistic::{LogisticParams, LogisticRegression};
use preprocess::{MedianImputer, StandardScaler};
pub use training::{train_audio_model, TrainingReport};

/// Artifact schema version; bump when the JSON layout changes
pub const ARTIFACT_VERSION: &str = "moodlens-audio-1";

// ============================================================================
// Estimators
// ============================================================================

/// A fitted classifier over standardized feature vectors.
///
/// Class indices refer to the artifact's `labels` list.
pub trait Classifier: Send + Sync {
    fn n_classes(&self) -> usize;

    fn n_features(&self) -> usize;

    /// Hard label
    fn predict_index(&self, x: &[f64]) -> usize;

    /// Per-class probabilities, `None` for estimators that only give a hard label
    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>>;
}

/// Index of the largest value; ties go to the lowest index, NaN never wins
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}

/// Balanced class weights: `n / (n_present_classes * count)`, 0 for absent classes
pub(crate) fn class_weights(y: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n_classes];
    for &c in y {
        if c < n_classes {
            counts[c] += 1;
        }
    }
    let present = counts.iter().filter(|&&c| c > 0).count().max(1) as f64;
    let n = y.len() as f64;
    counts
        .iter()
        .map(|&c| if c == 0 { 0.0 } else { n / (present * c as f64) })
        .collect()
}

/// Estimator families, in candidate registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    LogisticRegression,
    KNearestNeighbors,
    RandomForest,
}

impl EstimatorKind {
    /// Candidates evaluated by model selection; earlier entries win CV ties
    pub const CANDIDATES: [EstimatorKind; 3] = [
        EstimatorKind::LogisticRegression,
        EstimatorKind::KNearestNeighbors,
        EstimatorKind::RandomForest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::LogisticRegression => "logistic_regression",
            EstimatorKind::KNearestNeighbors => "k_nearest_neighbors",
            EstimatorKind::RandomForest => "random_forest",
        }
    }

    /// Fit this family on standardized rows
    pub fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        config: &TrainingConfig,
    ) -> Estimator {
        match self {
            EstimatorKind::LogisticRegression => Estimator::LogisticRegression(
                LogisticRegression::fit(x, y, n_classes, LogisticParams::default()),
            ),
            EstimatorKind::KNearestNeighbors => Estimator::KNearestNeighbors(
                KNearestNeighbors::fit(x, y, n_classes, config.knn_neighbors),
            ),
            EstimatorKind::RandomForest => Estimator::RandomForest(RandomForest::fit(
                x,
                y,
                n_classes,
                ForestParams {
                    n_trees: config.forest_trees,
                    seed: config.seed,
                    ..ForestParams::default()
                },
            )),
        }
    }
}

/// Fitted estimator, tagged by family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression(LogisticRegression),
    KNearestNeighbors(KNearestNeighbors),
    RandomForest(RandomForest),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::LogisticRegression(_) => EstimatorKind::LogisticRegression,
            Estimator::KNearestNeighbors(_) => EstimatorKind::KNearestNeighbors,
            Estimator::RandomForest(_) => EstimatorKind::RandomForest,
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::KNearestNeighbors(m) => m,
            Estimator::RandomForest(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_index(&self, x: &[f64]) -> usize {
        self.inner().predict_index(x)
    }

    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        self.inner().predict_proba(x)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub imputer: MedianImputer,
    pub scaler: StandardScaler,
    pub estimator: Estimator,
}

impl FittedPipeline {
    /// Fit imputer, scaler and estimator on the given (training) rows only
    pub fn fit(
        kind: EstimatorKind,
        rows: &[Vec<Option<f64>>],
        y: &[usize],
        n_features: usize,
        n_classes: usize,
        config: &TrainingConfig,
    ) -> Self {
        let imputer = MedianImputer::fit(rows, n_features);
        let imputed = imputer.transform(rows);
        let scaler = StandardScaler::fit(&imputed, n_features);
        let scaled = scaler.transform(&imputed);
        let estimator = kind.fit(&scaled, y, n_classes, config);
        Self {
            imputer,
            scaler,
            estimator,
        }
    }

    pub fn transform(&self, row: &[Option<f64>]) -> Vec<f64> {
        self.scaler.transform_row(&self.imputer.transform_row(row))
    }

    pub fn predict_index(&self, row: &[Option<f64>]) -> usize {
        self.estimator.predict_index(&self.transform(row))
    }

    pub fn predict_proba(&self, row: &[Option<f64>]) -> Option<Vec<f64>> {
        self.estimator.predict_proba(&self.transform(row))
    }
}

// ============================================================================
// Inference results
// ============================================================================

/// Outcome of one audio inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inference {
    /// Probabilities were available
    Scored(Prediction),
    /// Hard label only; confidence is unavailable rather than invented
    Unscored { mood: Mood },
}

impl Inference {
    pub fn mood(&self) -> Mood {
        match self {
            Inference::Scored(p) => p.mood,
            Inference::Unscored { mood } => *mood,
        }
    }

    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Inference::Scored(p) => Some(p),
            Inference::Unscored { .. } => None,
        }
    }
}

// ============================================================================
// Artifact
// ============================================================================

/// Everything needed to run inference, as persisted by `moodlens-train`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub pipeline: FittedPipeline,
    /// Column order the pipeline was fit on
    pub features: Vec<Feature>,
    /// Sorted class list; index i decodes class i
    pub labels: Vec<Mood>,
    pub results: TrainingReport,
    pub trained_at: DateTime<Utc>,
    /// Version and git hash of the trainer
    #[serde(default)]
    pub build: Option<String>,
}

impl ModelArtifact {
    /// Load and validate. A missing file surfaces as `Error::Io(NotFound)`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content)
            .map_err(|e| Error::Model(format!("Parse artifact {} failed: {}", path.display(), e)))?;
        artifact.validate()?;
        info!(
            path = %path.display(),
            estimator = artifact.pipeline.estimator.kind().as_str(),
            features = artifact.features.len(),
            trained_at = %artifact.trained_at,
            "Loaded audio model"
        );
        Ok(artifact)
    }

    /// Write atomically (temp file + rename), creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string(self)?;
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Check internal consistency of the stored pipeline
    pub fn validate(&self) -> Result<()> {
        if self.version != ARTIFACT_VERSION {
            return Err(Error::Model(format!(
                "Unsupported artifact version '{}' (expected '{}')",
                self.version, ARTIFACT_VERSION
            )));
        }
        if self.features.is_empty() || self.labels.is_empty() {
            return Err(Error::Model(
                "Artifact has an empty feature or label list".to_string(),
            ));
        }
        let n_features = self.features.len();
        let estimator = &self.pipeline.estimator;
        if self.pipeline.imputer.n_features() != n_features
            || self.pipeline.scaler.n_features() != n_features
            || estimator.n_features() != n_features
        {
            return Err(Error::Model(format!(
                "Pipeline dimensions disagree with {} stored features",
                n_features
            )));
        }
        if estimator.n_classes() != self.labels.len() {
            return Err(Error::Model(format!(
                "Estimator has {} classes but {} labels are stored",
                estimator.n_classes(),
                self.labels.len()
            )));
        }
        Ok(())
    }

    /// Training medians keyed by feature
    pub fn medians(&self) -> BTreeMap<Feature, f64> {
        self.features
            .iter()
            .copied()
            .zip(self.pipeline.imputer.medians.iter().copied())
            .collect()
    }

    /// Classify one record; missing features take the training medians
    pub fn infer(&self, record: &FeatureRecord) -> Inference {
        self.decide(&record.ordered(&self.features))
    }

    /// Classify with missing features replaced by `fallback` instead of the medians
    pub fn infer_with_fallback(&self, record: &FeatureRecord, fallback: f64) -> Inference {
        let row: Vec<Option<f64>> = record
            .ordered_with_fallback(&self.features, fallback)
            .into_iter()
            .map(Some)
            .collect();
        self.decide(&row)
    }

    fn decide(&self, row: &[Option<f64>]) -> Inference {
        let x = self.pipeline.transform(row);
        classify(&self.pipeline.estimator, &self.labels, &x)
    }
}

/// Run a classifier and decode its output with the training-time label order
pub fn classify(classifier: &dyn Classifier, labels: &[Mood], x: &[f64]) -> Inference {
    classifier
        .predict_proba(x)
        .and_then(|p| Prediction::from_probabilities(labels, &p))
        .map(Inference::Scored)
        .unwrap_or_else(|| {
            let index = classifier.predict_index(x);
            Inference::Unscored {
                mood: labels
                    .get(index)
                    .or_else(|| labels.last())
                    .copied()
                    .unwrap_or(Mood::Chill),
            }
        })
}
