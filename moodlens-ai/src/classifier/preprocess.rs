//! Preprocessing stages: median imputation, then standardization.
//!
//! Both are fit on the training partition only and stored in the artifact.

use serde::{Deserialize, Serialize};

/// Replaces missing values with the per-feature training median
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    pub medians: Vec<f64>,
}

impl MedianImputer {
    /// A column with no observed values gets a median of 0.0
    pub fn fit(rows: &[Vec<Option<f64>>], n_features: usize) -> Self {
        let medians = (0..n_features)
            .map(|j| {
                let mut observed: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r.get(j).copied().flatten())
                    .filter(|v| v.is_finite())
                    .collect();
                median(&mut observed).unwrap_or(0.0)
            })
            .collect();
        Self { medians }
    }

    pub fn n_features(&self) -> usize {
        self.medians.len()
    }

    pub fn transform_row(&self, row: &[Option<f64>]) -> Vec<f64> {
        self.medians
            .iter()
            .enumerate()
            .map(|(j, median)| {
                row.get(j)
                    .copied()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .unwrap_or(*median)
            })
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Zero mean, unit variance per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    /// Population standard deviation; constant columns use 1.0
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>], n_features: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let means: Vec<f64> = (0..n_features)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales = (0..n_features)
            .map(|j| {
                let variance = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                if std.is_finite() && std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Self { means, scales }
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imputer_uses_training_median() {
        let rows = vec![
            vec![Some(1.0), None],
            vec![Some(3.0), None],
            vec![None, None],
            vec![Some(10.0), None],
        ];
        let imputer = MedianImputer::fit(&rows, 2);
        assert_eq!(imputer.medians, vec![3.0, 0.0]);
        assert_eq!(imputer.transform_row(&[None, Some(5.0)]), vec![3.0, 5.0]);
    }

    #[test]
    fn test_even_median_averages() {
        let rows = vec![vec![Some(1.0)], vec![Some(2.0)], vec![Some(4.0)], vec![Some(8.0)]];
        assert_eq!(MedianImputer::fit(&rows, 1).medians, vec![3.0]);
    }

    #[test]
    fn test_scaler_standardizes() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows, 2);
        assert_eq!(scaler.means, vec![2.0, 5.0]);
        assert_eq!(scaler.scales, vec![1.0, 1.0]);
        assert_eq!(scaler.transform_row(&[3.0, 5.0]), vec![1.0, 0.0]);
    }
}
