//! Confidence-annotated prediction shared by both models

use serde::{Deserialize, Serialize};

use crate::numeric::sanitize_unit;
use crate::Mood;

/// One model's verdict for one song
///
/// Invariants (enforced by the constructors):
/// - `confidence >= second_confidence`
/// - `margin == confidence - second_confidence`, within [0, 1]
/// - `second_choice != Some(mood)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub mood: Mood,
    pub confidence: f64,
    pub second_choice: Option<Mood>,
    pub second_confidence: f64,
    pub margin: f64,
}

impl Prediction {
    /// Build a prediction from a per-class probability vector.
    ///
    /// `labels[i]` names the class of `probabilities[i]`; this must be the
    /// ordering captured when the model was trained. Each probability is
    /// sanitized before ranking, so a corrupted vector degrades to zeros
    /// instead of leaking NaN. Ties resolve to the lowest index.
    ///
    /// Returns `None` when the vector is empty or its length disagrees with
    /// `labels`.
    pub fn from_probabilities(labels: &[Mood], probabilities: &[f64]) -> Option<Self> {
        if labels.is_empty() || labels.len() != probabilities.len() {
            return None;
        }

        let probs: Vec<f64> = probabilities.iter().map(|p| sanitize_unit(*p)).collect();

        let mut best = 0;
        for (i, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = i;
            }
        }

        let mut runner_up: Option<usize> = None;
        for (i, p) in probs.iter().enumerate() {
            if i == best || labels[i] == labels[best] {
                continue;
            }
            match runner_up {
                Some(r) if *p <= probs[r] => {}
                _ => runner_up = Some(i),
            }
        }

        let confidence = probs[best];
        let second_confidence = runner_up.map(|r| probs[r]).unwrap_or(0.0);

        Some(Self {
            mood: labels[best],
            confidence,
            second_choice: runner_up.map(|r| labels[r]),
            second_confidence,
            margin: sanitize_unit(confidence - second_confidence),
        })
    }

    /// Prediction from a model that scores only its chosen class
    /// (the lyrics heuristic). There is no runner-up, so the margin equals
    /// the confidence.
    pub fn single(mood: Mood, confidence: f64) -> Self {
        let confidence = sanitize_unit(confidence);
        Self {
            mood,
            confidence,
            second_choice: None,
            second_confidence: 0.0,
            margin: confidence,
        }
    }

    /// Confidence strictly below `threshold`
    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }

    /// Margin strictly below `threshold`: two classes remain plausible
    pub fn is_borderline(&self, threshold: f64) -> bool {
        self.margin < threshold
    }
}
