//! Random forest of CART trees.
//!
//! - gini impurity, exhaustive threshold search over a random feature subset
//!   of size `sqrt(n_features)`
//! - bootstrap sampling per tree
//! - "balanced subsample" class weights: recomputed from each tree's
//!   bootstrap sample
//! - forest probability = mean of the trees' leaf class distributions
//!
//! Trees are grown in parallel with rayon; each tree has its own seeded RNG so
//! results do not depend on scheduling.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{argmax, class_weights, Classifier};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 400,
            max_depth: 32,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

/// One fitted tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, x: &[f64]) -> Option<&[f64]> {
        let mut current = 0;
        loop {
            match self.nodes.get(current)? {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    current = if value <= *threshold { *left } else { *right };
                }
                Node::Leaf { distribution } => return Some(distribution.as_slice()),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_classes: usize,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize, params: ForestParams) -> Self {
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let trees = if x.is_empty() {
            Vec::new()
        } else {
            (0..params.n_trees)
                .into_par_iter()
                .map(|t| {
                    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                    TreeBuilder::new(x, y, n_classes, params, &mut rng).build()
                })
                .collect()
        };
        Self {
            n_classes,
            n_features,
            trees,
        }
    }

    fn mean_distribution(&self, x: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0; self.n_classes];
        let mut counted = 0usize;
        for tree in &self.trees {
            if let Some(dist) = tree.leaf_distribution(x) {
                for (t, p) in total.iter_mut().zip(dist) {
                    *t += p;
                }
                counted += 1;
            }
        }
        if counted > 0 {
            for t in &mut total {
                *t /= counted as f64;
            }
        }
        total
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_index(&self, x: &[f64]) -> usize {
        argmax(&self.mean_distribution(x))
    }

    fn predict_proba(&self, x: &[f64]) -> Option<Vec<f64>> {
        Some(self.mean_distribution(x))
    }
}

// ============================================================================
// Tree growing
// ============================================================================

struct TreeBuilder<'a, R: Rng> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    params: ForestParams,
    rng: &'a mut R,
    /// Per-row weight: bootstrap multiplicity times class weight
    weights: Vec<f64>,
    nodes: Vec<Node>,
}

impl<'a, R: Rng> TreeBuilder<'a, R> {
    fn new(
        x: &'a [Vec<f64>],
        y: &'a [usize],
        n_classes: usize,
        params: ForestParams,
        rng: &'a mut R,
    ) -> Self {
        let n = x.len();
        let n_features = x.first().map(Vec::len).unwrap_or(0);

        let mut multiplicity = vec![0usize; n];
        for _ in 0..n {
            multiplicity[rng.gen_range(0..n)] += 1;
        }
        let drawn: Vec<usize> = multiplicity
            .iter()
            .enumerate()
            .flat_map(|(i, &m)| std::iter::repeat(y[i]).take(m))
            .collect();
        let class_weight = class_weights(&drawn, n_classes);
        let weights = multiplicity
            .iter()
            .zip(y)
            .map(|(&m, &c)| m as f64 * class_weight[c])
            .collect();

        Self {
            x,
            y,
            n_classes,
            n_features,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
            params,
            rng,
            weights,
            nodes: Vec::new(),
        }
    }

    fn build(mut self) -> DecisionTree {
        let samples: Vec<usize> = (0..self.x.len()).filter(|&i| self.weights[i] > 0.0).collect();
        self.grow(samples, 0);
        DecisionTree { nodes: self.nodes }
    }

    fn class_totals(&self, samples: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &i in samples {
            totals[self.y[i]] += self.weights[i];
        }
        totals
    }

    /// Grow the subtree for `samples`; returns its node index
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let totals = self.class_totals(&samples);
        let weight: f64 = totals.iter().sum();
        let pure = totals.iter().filter(|t| **t > 0.0).count() <= 1;

        let split = if pure
            || depth >= self.params.max_depth
            || samples.len() < self.params.min_samples_split
        {
            None
        } else {
            self.best_split(&samples, &totals)
        };

        let Some((feature, threshold)) = split else {
            let distribution = if weight > 0.0 {
                totals.iter().map(|t| t / weight).collect()
            } else {
                vec![0.0; self.n_classes]
            };
            self.nodes.push(Node::Leaf { distribution });
            return self.nodes.len() - 1;
        };

        let index = self.nodes.len();
        self.nodes.push(Node::Split {
            feature,
            threshold,
            left: 0,
            right: 0,
        });

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[i][feature] <= threshold);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Best (feature, threshold) by weighted gini decrease.
    ///
    /// Features are drawn in random order; the search stops after
    /// `max_features` candidates unless none of them could split the node.
    fn best_split(&mut self, samples: &[usize], totals: &[f64]) -> Option<(usize, f64)> {
        let parent_weight: f64 = totals.iter().sum();
        let parent_impurity = gini(totals, parent_weight);
        let order = sample(&mut *self.rng, self.n_features, self.n_features).into_vec();

        let mut best: Option<(usize, f64, f64)> = None;
        for (tried, &feature) in order.iter().enumerate() {
            if tried >= self.max_features && best.is_some() {
                break;
            }
            let mut sorted = samples.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = vec![0.0; self.n_classes];
            let mut left_weight = 0.0;
            for pos in 0..sorted.len().saturating_sub(1) {
                let i = sorted[pos];
                left[self.y[i]] += self.weights[i];
                left_weight += self.weights[i];

                let here = self.x[i][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if next <= here {
                    continue;
                }

                let right_weight = parent_weight - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }
                let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
                let child_impurity = (left_weight * gini(&left, left_weight)
                    + right_weight * gini(&right, right_weight))
                    / parent_weight;
                let decrease = parent_impurity - child_impurity;

                if best.map_or(true, |(_, _, d)| decrease > d) {
                    best = Some((feature, (here + next) / 2.0, decrease));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn gini(totals: &[f64], weight: f64) -> f64 {
    if weight <= 0.0 {
        return 0.0;
    }
    1.0 - totals.iter().map(|t| (t / weight).powi(2)).sum::<f64>()
}
