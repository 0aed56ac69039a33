//! Isolation forest
//!
//! Ensemble of random partitioning trees for unsupervised outlier scoring.
//! Each tree isolates points by recursive random splits; outliers sit behind
//! fewer splits, so short average path lengths mean anomalous points.
//!
//! Scores follow the standard formulation `s(x) = 2^(-E(h(x))/c(n))` where
//! `E(h(x))` is the expected path length across trees and `c(n)` the average
//! path length of an unsuccessful BST search over the per-tree subsample.
//! [`IsolationForest::score_samples`] returns the negated score so that more
//! negative always means more anomalous; the caller applies its
//! contamination offset on top.
//!
//! Trees are grown from deterministic per-tree seeds derived from one base
//! seed, so a fitted forest is reproducible and serializes as plain data.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Configuration for fitting an isolation forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub num_trees: usize,

    /// Per-tree subsample size (capped at the training-set size)
    pub sample_size: usize,

    /// Base RNG seed; tree `i` uses `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

/// Arena node of one isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
    },
    External {
        size: usize,
    },
}

/// A single isolation tree in arena representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(
        samples: &[Vec<f64>],
        indices: Vec<usize>,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = Vec::new();
        Self::build(&mut nodes, samples, indices, 0, max_depth, rng);
        Self { nodes }
    }

    fn build(
        nodes: &mut Vec<Node>,
        samples: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        if depth >= max_depth || indices.len() <= 1 {
            nodes.push(Node::External {
                size: indices.len(),
            });
            return nodes.len() - 1;
        }

        let Some((feature, split)) = select_split(samples, &indices, rng) else {
            // Every remaining point is identical along every feature
            nodes.push(Node::External {
                size: indices.len(),
            });
            return nodes.len() - 1;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| samples[i][feature] < split);

        if left.is_empty() || right.is_empty() {
            let size = left.len() + right.len();
            nodes.push(Node::External { size });
            return nodes.len() - 1;
        }

        // Reserve the slot so children land after their parent
        let index = nodes.len();
        nodes.push(Node::External { size: 0 });
        let left_index = Self::build(nodes, samples, left, depth + 1, max_depth, rng);
        let right_index = Self::build(nodes, samples, right, depth + 1, max_depth, rng);
        nodes[index] = Node::Internal {
            feature,
            split,
            left: left_index,
            right: right_index,
        };
        index
    }

    /// Path length for a sample, with the external-node size correction
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::External { size } => return depth + average_path_length(*size),
                Node::Internal {
                    feature,
                    split,
                    left,
                    right,
                } => {
                    index = if sample[*feature] < *split {
                        *left
                    } else {
                        *right
                    };
                    depth += 1.0;
                }
            }
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Pick a random feature with spread and a random split inside its range
fn select_split(
    samples: &[Vec<f64>],
    indices: &[usize],
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let n_features = samples[indices[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|feature| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &i in indices {
                let value = samples[i][feature];
                min = min.min(value);
                max = max.max(value);
            }
            ((max - min).abs() > f64::EPSILON).then_some((feature, min, max))
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
    Some((feature, rng.gen_range(min..max)))
}

/// Fitted ensemble of isolation trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit a forest over the rows of `samples`.
    ///
    /// Tree depth is capped at `ceil(log2(sample_size))`, past which points
    /// are already isolated in expectation.
    pub fn fit(samples: &[Vec<f64>], config: &ForestConfig) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::Training {
                reason: "cannot fit isolation forest on an empty set".to_string(),
            });
        }
        if config.num_trees == 0 {
            return Err(ModelError::Training {
                reason: "forest needs at least one tree".to_string(),
            });
        }

        let n_cols = samples[0].len();
        if n_cols == 0 || samples.iter().any(|row| row.len() != n_cols) {
            return Err(ModelError::Training {
                reason: "ragged or empty feature matrix".to_string(),
            });
        }

        let sample_size = config.sample_size.clamp(1, samples.len());
        let max_depth = ((sample_size as f64).log2().ceil() as usize).max(1);

        let trees = (0..config.num_trees)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices = subsample(samples.len(), sample_size, &mut rng);
                IsolationTree::grow(samples, indices, max_depth, &mut rng)
            })
            .collect();

        Ok(Self { trees, sample_size })
    }

    /// Negated anomaly score; more negative = more anomalous, range (-1, 0)
    pub fn score_samples(&self, sample: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum();
        let avg_path = total / self.trees.len() as f64;

        let expected = average_path_length(self.sample_size);
        if expected <= 0.0 {
            return -0.5;
        }

        -(2.0_f64.powf(-avg_path / expected))
    }

    /// Number of trees in the ensemble
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-tree subsample size used during fitting
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }
}

/// Random subset of `k` indices out of `n`, partial Fisher-Yates
fn subsample(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k.min(n) {
        let j = i + rng.gen_range(0..n - i);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_samples() -> Vec<Vec<f64>> {
        let mut samples = Vec::new();
        for i in 0..40 {
            let x = 20.0 + (i % 5) as f64 * 0.1;
            let y = 50.0 + (i % 7) as f64 * 0.2;
            samples.push(vec![x, y]);
        }
        samples
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            num_trees: 25,
            sample_size: 32,
            seed: 123,
        }
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        let err = IsolationForest::fit(&[], &small_config()).unwrap_err();
        assert!(matches!(err, ModelError::Training { .. }));
    }

    #[test]
    fn test_fit_rejects_ragged_matrix() {
        let samples = vec![vec![1.0, 2.0], vec![3.0]];
        let err = IsolationForest::fit(&samples, &small_config()).unwrap_err();
        assert!(matches!(err, ModelError::Training { .. }));
    }

    #[test]
    fn test_outlier_scores_below_inlier_scores() {
        let samples = clustered_samples();
        let forest = IsolationForest::fit(&samples, &small_config()).unwrap();

        let inlier_score = forest.score_samples(&[20.2, 50.4]);
        let outlier_score = forest.score_samples(&[80.0, -10.0]);

        assert!(
            outlier_score < inlier_score,
            "outlier {outlier_score} vs inlier {inlier_score}"
        );
        assert!(outlier_score > -1.0 && outlier_score < 0.0);
        assert!(inlier_score > -1.0 && inlier_score < 0.0);
    }

    #[test]
    fn test_fit_is_deterministic_for_a_seed() {
        let samples = clustered_samples();
        let forest_a = IsolationForest::fit(&samples, &small_config()).unwrap();
        let forest_b = IsolationForest::fit(&samples, &small_config()).unwrap();
        assert_eq!(forest_a, forest_b);

        let probe = [21.0, 51.0];
        assert_eq!(forest_a.score_samples(&probe), forest_b.score_samples(&probe));
    }

    #[test]
    fn test_forest_round_trips_through_json() {
        let samples = clustered_samples();
        let forest = IsolationForest::fit(&samples, &small_config()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let restored: IsolationForest = serde_json::from_str(&json).unwrap();

        let probe = [20.1, 50.2];
        assert_eq!(forest.score_samples(&probe), restored.score_samples(&probe));
    }

    #[test]
    fn test_identical_points_collapse_to_external_node() {
        let samples = vec![vec![5.0, 5.0]; 16];
        let forest = IsolationForest::fit(&samples, &small_config()).unwrap();
        // Degenerate data still produces a usable, finite score
        assert!(forest.score_samples(&[5.0, 5.0]).is_finite());
    }

    #[test]
    fn test_average_path_length_growth() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(64) > average_path_length(16));
        assert!((average_path_length(256) - 10.24).abs() < 0.05);
    }
}
