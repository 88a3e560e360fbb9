//! k-nearest-neighbor classifier (Euclidean distance, uniform votes)

use serde::{Deserialize, Serialize};

use super::{argmax, Classifier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub k: usize,
    pub n_classes: usize,
    /// Standardized training rows
    pub points: Vec<Vec<f64>>,
    pub targets: Vec<usize>,
}

impl KNearestNeighbors {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, k: usize) -> Self {
        Self {
            k: k.max(1),
            n_classes,
            points: x.to_vec(),
            targets: y.to_vec(),
        }
    }

    /// Indices of the k closest points; equal distances resolve by training order
    fn neighbors(&self, x: &[f64]) -> Vec<usize> {
        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d: f64 = p.iter().zip(x).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .collect();
        let k = self.k.min(distances.len());
        if k == 0 {
            return Vec::new();
        }
        let by_distance = |a: &(f64, usize), b: &(f64, usize)| {
            a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
        };
        distances.select_nth_unstable_by(k - 1, by_distance);
        distances.truncate(k);
        distances.sort_by(by_distance);
        distances.into_iter().map(|(_, i)| i).collect()
    }

    fn votes(&self, x: &[f64]) -> Vec<f64> {
        let neighbors = self.neighbors(x);
        let mut votes = vec![0.0; self.n_classes];
        if neighbors.is_empty() {
            return votes;
        }
        let share = 1.0 / neighbors.len() as f64;
        for i in neighbors {
            if let Some(slot) = votes.get_mut(self.targets[i]) {
                *slot += share;
            }
        }
        votes
    }
}

impl Classifier for KNearestNeighbors {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.points.first().map(Vec::len).unwrap_or(0)
    }

    fn predict_index(&self, x: &[f64]) -> usize {
        argmax(&self.votes(x))
    }

    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        Some(self.votes(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_fractions() {
        let x = vec![
            vec![0.0],
            vec![0.1],
            vec![0.2],
            vec![5.0],
            vec![5.1],
            vec![9.0],
        ];
        let y = vec![0, 0, 1, 1, 1, 2];
        let model = KNearestNeighbors::fit(&x, &y, 3, 3);

        let p = model.predict_proba(&[0.05]).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(p[2], 0.0);
        assert_eq!(model.predict_index(&[0.05]), 0);
        assert_eq!(model.predict_index(&[5.05]), 1);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let model = KNearestNeighbors::fit(&[vec![0.0], vec![1.0]], &[0, 1], 2, 5);
        let p = model.predict_proba(&[0.2]).unwrap();
        assert_eq!(p, vec![0.5, 0.5]);
        // Tie goes to the lowest class index
        assert_eq!(model.predict_index(&[0.2]), 0);
    }
}
