use crate::types::{TalusError, TalusResult};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fixed hyperparameters of the susceptibility classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of bagged trees in the ensemble
    pub n_trees: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Master seed; per-tree generators are derived from it so results
    /// do not depend on thread scheduling
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 4,
            seed: 42,
        }
    }
}

/// A node of a binary CART tree
#[derive(Debug, Clone)]
enum TreeNode {
    /// Terminal node holding the fraction of positive training samples
    /// that reached it
    Leaf { positive_fraction: f32 },
    /// Split on `feature <= threshold` (left) vs `feature > threshold`
    Split {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: &[f32]) -> f32 {
        match self {
            TreeNode::Leaf { positive_fraction } => *positive_fraction,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Bagged decision-tree ensemble estimating per-pixel landslide
/// susceptibility.
///
/// The feature width seen at fit time becomes part of the model's
/// identity; scoring a matrix of a different width is rejected.
#[derive(Debug)]
pub struct SusceptibilityForest {
    trees: Vec<TreeNode>,
    n_features: usize,
    config: ForestConfig,
}

// Gini impurity of a binary class distribution
fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl SusceptibilityForest {
    /// Train the ensemble on a feature matrix and binary label vector.
    ///
    /// Fails with a degenerate-training error before any tree is grown
    /// when the labels carry a single class, since fitting would be
    /// meaningless.
    pub fn fit(x: &Array2<f32>, y: &[u8], config: ForestConfig) -> TalusResult<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err(TalusError::Processing(
                "cannot train on an empty feature matrix".to_string(),
            ));
        }
        if y.len() != n_samples {
            return Err(TalusError::Processing(format!(
                "label vector length {} does not match {} feature rows",
                y.len(),
                n_samples
            )));
        }

        let positives = y.iter().filter(|&&l| l == 1).count();
        if positives == 0 || positives == n_samples {
            return Err(TalusError::DegenerateTraining(format!(
                "label vector holds a single class ({} of {} positive)",
                positives, n_samples
            )));
        }

        log::info!(
            "Training {} trees (max depth {}) on {} samples x {} features, {} positive",
            config.n_trees,
            config.max_depth,
            n_samples,
            n_features,
            positives
        );

        let grow_one = |tree_index: usize| -> TreeNode {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(tree_index as u64));
            let bootstrap: Vec<usize> =
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            Self::grow(x, y, &bootstrap, 0, &config, &mut rng)
        };

        #[cfg(feature = "parallel")]
        let trees: Vec<TreeNode> = {
            use rayon::prelude::*;
            (0..config.n_trees).into_par_iter().map(grow_one).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let trees: Vec<TreeNode> = (0..config.n_trees).map(grow_one).collect();

        log::info!("Ensemble training completed");

        Ok(Self {
            trees,
            n_features,
            config,
        })
    }

    /// Estimated probability of the positive class for each feature row,
    /// averaged over all trees
    pub fn predict_proba(&self, x: &Array2<f32>) -> TalusResult<Vec<f32>> {
        if x.ncols() != self.n_features {
            return Err(TalusError::Processing(format!(
                "model was trained on {} features but scoring matrix has {}",
                self.n_features,
                x.ncols()
            )));
        }

        let n_trees = self.trees.len() as f32;
        let probabilities = x
            .rows()
            .into_iter()
            .map(|row| {
                let sample = row.to_vec();
                let sum: f32 = self.trees.iter().map(|tree| tree.predict(&sample)).sum();
                sum / n_trees
            })
            .collect();
        Ok(probabilities)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    fn grow(
        x: &Array2<f32>,
        y: &[u8],
        indices: &[usize],
        depth: usize,
        config: &ForestConfig,
        rng: &mut StdRng,
    ) -> TreeNode {
        let total = indices.len();
        let positives = indices.iter().filter(|&&i| y[i] == 1).count();

        let leaf = |positives: usize, total: usize| TreeNode::Leaf {
            positive_fraction: positives as f32 / total as f32,
        };

        if depth >= config.max_depth || positives == 0 || positives == total || total < 2 {
            return leaf(positives, total);
        }

        match Self::best_split(x, y, indices, rng) {
            Some((feature, threshold)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .copied()
                    .partition(|&i| x[[i, feature]] <= threshold);

                TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(Self::grow(x, y, &left_idx, depth + 1, config, rng)),
                    right: Box::new(Self::grow(x, y, &right_idx, depth + 1, config, rng)),
                }
            }
            None => leaf(positives, total),
        }
    }

    /// Best gini-gain split over a sqrt-sized random feature subset.
    ///
    /// Candidate thresholds are midpoints between consecutive distinct
    /// sorted values. Returns None when no split improves on the parent.
    fn best_split(
        x: &Array2<f32>,
        y: &[u8],
        indices: &[usize],
        rng: &mut StdRng,
    ) -> Option<(usize, f32)> {
        let total = indices.len();
        let n_features = x.ncols();
        let parent_positives = indices.iter().filter(|&&i| y[i] == 1).count();
        let parent_impurity = gini(parent_positives, total);

        let n_candidates = (n_features as f64).sqrt().ceil() as usize;
        let candidates = rand::seq::index::sample(rng, n_features, n_candidates.min(n_features));

        let mut best: Option<(usize, f32, f64)> = None;

        for feature in candidates.iter() {
            let mut values: Vec<(f32, u8)> = indices
                .iter()
                .map(|&i| (x[[i, feature]], y[i]))
                .collect();
            values.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_total = 0usize;
            let mut left_positives = 0usize;
            for w in 1..total {
                left_total += 1;
                left_positives += values[w - 1].1 as usize;

                // Only split between distinct values
                if values[w].0 <= values[w - 1].0 {
                    continue;
                }

                let right_total = total - left_total;
                let right_positives = parent_positives - left_positives;
                let weighted = (left_total as f64 / total as f64)
                    * gini(left_positives, left_total)
                    + (right_total as f64 / total as f64) * gini(right_positives, right_total);
                let gain = parent_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    let threshold = 0.5 * (values[w - 1].0 + values[w].0);
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}
