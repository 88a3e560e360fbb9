//! Multinomial logistic regression with L2 penalty and balanced class weights.
//!
//! Fit by full-batch gradient descent on standardized inputs. Each sample's
//! loss is weighted by `n / (n_classes * count(class))` so minority moods are
//! not drowned out.

use serde::{Deserialize, Serialize};

use super::{argmax, class_weights, Classifier};

/// Solver settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Stop once the largest gradient component falls below this
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 500,
            learning_rate: 0.5,
            tolerance: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// `weights[class][feature]`
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LogisticRegression {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: LogisticParams) -> Self {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let mut model = Self {
            weights: vec![vec![0.0; n_features]; n_classes],
            intercepts: vec![0.0; n_classes],
        };
        if x.is_empty() || n_classes == 0 {
            return model;
        }

        let class_weight = class_weights(y, n_classes);
        let sample_weight: Vec<f64> = y.iter().map(|&c| class_weight[c]).collect();
        let total_weight: f64 = sample_weight.iter().sum::<f64>().max(f64::EPSILON);
        let l2 = 1.0 / (params.c * total_weight);

        for _ in 0..params.max_iter {
            let mut grad_w = vec![vec![0.0; n_features]; n_classes];
            let mut grad_b = vec![0.0; n_classes];

            for (i, row) in x.iter().enumerate() {
                let probs = model.softmax(row);
                for c in 0..n_classes {
                    let target = if y[i] == c { 1.0 } else { 0.0 };
                    let err = sample_weight[i] * (probs[c] - target);
                    grad_b[c] += err;
                    for (g, xj) in grad_w[c].iter_mut().zip(row) {
                        *g += err * xj;
                    }
                }
            }

            let mut largest: f64 = 0.0;
            for c in 0..n_classes {
                for j in 0..n_features {
                    let g = grad_w[c][j] / total_weight + l2 * model.weights[c][j];
                    model.weights[c][j] -= params.learning_rate * g;
                    largest = largest.max(g.abs());
                }
                let g = grad_b[c] / total_weight;
                model.intercepts[c] -= params.learning_rate * g;
                largest = largest.max(g.abs());
            }

            if largest < params.tolerance {
                break;
            }
        }

        model
    }

    fn softmax(&self, x: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + w.iter().zip(x).map(|(wj, xj)| wj * xj).sum::<f64>())
            .collect();
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.iter().map(|e| e / sum).collect()
    }
}

impl Classifier for LogisticRegression {
    fn n_classes(&self) -> usize {
        self.intercepts.len()
    }

    fn n_features(&self) -> usize {
        self.weights.first().map(Vec::len).unwrap_or(0)
    }

    fn predict_index(&self, x: &[f64]) -> usize {
        argmax(&self.softmax(x))
    }

    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        Some(self.softmax(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_linear_classes() {
        let x: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let centre = if i < 20 { -1.0 } else { 1.0 };
                vec![centre + (i % 5) as f64 * 0.05]
            })
            .collect();
        let y: Vec<usize> = (0..40).map(|i| usize::from(i >= 20)).collect();
        let model = LogisticRegression::fit(&x, &y, 2, LogisticParams::default());

        assert_eq!(model.predict_index(&[-1.2]), 0);
        assert_eq!(model.predict_index(&[1.2]), 1);
        let p = model.predict_proba(&[1.2]).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p[1] > 0.5);
    }

    #[test]
    fn test_softmax_is_stable_for_large_inputs() {
        let model = LogisticRegression {
            weights: vec![vec![1000.0], vec![-1000.0]],
            intercepts: vec![0.0, 0.0],
        };
        let p = model.predict_proba(&[5.0]).unwrap();
        assert!(p.iter().all(|v| v.is_finite()));
        assert_eq!(model.predict_index(&[5.0]), 0);
    }
}
