//! Random-forest regressor over feature vectors.
//!
//! Hand-rolled bootstrap-aggregated CART regression trees: each tree is grown
//! on a bootstrap sample with variance-reduction splits over a random feature
//! subset, and the forest predicts the mean of its trees. Per-tree rngs are
//! derived from the run seed, so fitting is deterministic end to end.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Hyperparameters for forest fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees.
    pub trees: usize,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum samples per leaf.
    pub min_leaf: usize,
    /// Seed for bootstrap sampling and feature subsampling.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: 60,
            max_depth: 10,
            min_leaf: 4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    fn predict(&self, features: &[f64]) -> f64 {
        let mut current = self.root;
        loop {
            match &self.nodes[current] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Fitted forest of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<Tree>,
}

impl RandomForestRegressor {
    /// Fits the forest on a feature matrix and continuous targets.
    ///
    /// Expects `x` and `y` of equal, non-zero length; callers validate
    /// upstream (training aborts before reaching an empty matrix).
    #[must_use]
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &ForestConfig) -> Self {
        let n = x.len();
        let dims = x.first().map_or(0, Vec::len);
        // Feature subset size per split, sqrt(d) as is conventional.
        let features_per_split = ((dims as f64).sqrt().ceil() as usize).clamp(1, dims.max(1));

        let trees = (0..config.trees)
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();

                let mut builder = TreeBuilder {
                    x,
                    y,
                    config,
                    features_per_split,
                    dims,
                    nodes: Vec::new(),
                };
                let root = builder.grow(&sample, 0, &mut rng);
                Tree {
                    nodes: builder.nodes,
                    root,
                }
            })
            .collect();

        Self { trees }
    }

    /// Mean prediction over all trees, clipped to [0, 1].
    #[must_use]
    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    /// Number of trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    config: &'a ForestConfig,
    features_per_split: usize,
    dims: usize,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    /// Grows a subtree over `indices`, returning its node id. Children are
    /// pushed before their parent, so ids always point backwards.
    fn grow(&mut self, indices: &[usize], depth: usize, rng: &mut StdRng) -> usize {
        let mean = self.mean(indices);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_leaf * 2
            || self.sse(indices, mean) <= f64::EPSILON
        {
            return self.push(Node::Leaf { value: mean });
        }

        let Some(split) = self.best_split(indices, rng) else {
            return self.push(Node::Leaf { value: mean });
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        let left = self.grow(&left_indices, depth + 1, rng);
        let right = self.grow(&right_indices, depth + 1, rng);
        self.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        })
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn mean(&self, indices: &[usize]) -> f64 {
        let sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        sum / indices.len().max(1) as f64
    }

    fn sse(&self, indices: &[usize], mean: f64) -> f64 {
        indices
            .iter()
            .map(|&i| {
                let d = self.y[i] - mean;
                d * d
            })
            .sum()
    }

    /// Best variance-reduction split over a random feature subset, or `None`
    /// when no candidate satisfies the min-leaf constraint.
    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let mut best: Option<BestSplit> = None;

        for feature in self.sample_features(rng) {
            let mut pairs: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let n = pairs.len();
            let total_sum: f64 = pairs.iter().map(|(_, t)| t).sum();
            let total_sq: f64 = pairs.iter().map(|(_, t)| t * t).sum();

            let mut left_sum = 0.0_f64;
            let mut left_sq = 0.0_f64;

            for i in 1..n {
                let (value, target) = pairs[i - 1];
                left_sum += target;
                left_sq += target * target;

                if i < self.config.min_leaf || n - i < self.config.min_leaf {
                    continue;
                }
                // Only split between distinct feature values.
                if value >= pairs[i].0 {
                    continue;
                }

                let left_n = i as f64;
                let right_n = (n - i) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;

                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (value + pairs[i].0) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }

    /// Random feature subset via partial Fisher-Yates.
    fn sample_features(&self, rng: &mut StdRng) -> Vec<usize> {
        let mut all: Vec<usize> = (0..self.dims).collect();
        for i in 0..self.features_per_split.min(self.dims) {
            let j = rng.random_range(i..self.dims);
            all.swap(i, j);
        }
        all.truncate(self.features_per_split);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Target is 0.9 when the first feature is high, 0.1 otherwise.
    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let f = f64::from(i);
            let high = i >= 20;
            // Second feature is noise so splits must find the first one.
            x.push(vec![
                if high { 5.0 + f * 0.01 } else { f * 0.01 },
                f64::from(i % 7),
            ]);
            y.push(if high { 0.9 } else { 0.1 });
        }
        (x, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(&x, &y, &ForestConfig::default());
        assert!(forest.predict(&[6.0, 3.0]) > 0.7);
        assert!(forest.predict(&[0.05, 3.0]) < 0.3);
    }

    #[test]
    fn predictions_stay_in_unit_interval() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(&x, &y, &ForestConfig::default());
        for row in &x {
            let p = forest.predict(row);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn fit_is_deterministic_for_fixed_seed() {
        let (x, y) = step_data();
        let config = ForestConfig::default();
        let a = RandomForestRegressor::fit(&x, &y, &config);
        let b = RandomForestRegressor::fit(&x, &y, &config);
        assert_eq!(a, b);
    }
}
