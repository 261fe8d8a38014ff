//! Binary classification tree (Gini impurity)

use crate::error::{MortalityError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the fraction of positive samples that reached it
    Leaf {
        positive_fraction: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Decision tree for 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split; all features when `None`
    pub max_features: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit on rows of `x` with labels in {0, 1}
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(MortalityError::Training("cannot fit a tree on an empty matrix".to_string()));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(MortalityError::Training("tree labels must be 0 or 1".to_string()));
        }

        self.n_features = n_features;
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, &mut rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let positives = indices.iter().filter(|&&i| y[i] > 0.5).count();
        let leaf = TreeNode::Leaf {
            positive_fraction: positives as f64 / n_samples as f64,
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || positives == 0
            || positives == n_samples;
        if should_stop {
            return leaf;
        }

        let features = self.candidate_features(rng);
        let parent_impurity = gini(n_samples, positives);

        let Some((feature_idx, threshold, gain)) =
            self.find_best_split(x, y, indices, &features, parent_impurity)
        else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Sorted random subset of feature indices for one split
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        if k == self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = sample(rng, self.n_features, k).into_vec();
        features.sort_unstable();
        features
    }

    /// Best (feature, threshold, gain) over `features`; earlier features win ties
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let n = indices.len();
        let total_pos = indices.iter().filter(|&&i| y[i] > 0.5).count();
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature_idx in features {
            let mut pairs: Vec<(f64, bool)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i] > 0.5))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0usize;
            for split in 0..n - 1 {
                if pairs[split].1 {
                    left_pos += 1;
                }
                // Only split between distinct values
                if pairs[split].0 == pairs[split + 1].0 {
                    continue;
                }

                let left_count = split + 1;
                let right_count = n - left_count;
                if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left_count as f64 * gini(left_count, left_pos)
                    + right_count as f64 * gini(right_count, total_pos - left_pos))
                    / n as f64;
                let gain = parent_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    let threshold = (pairs[split].0 + pairs[split + 1].0) / 2.0;
                    best = Some((feature_idx, threshold, gain));
                }
            }
        }

        best
    }

    /// Positive-class probability for one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let mut node = self.root.as_ref().ok_or(MortalityError::ModelNotFitted)?;
        loop {
            match node {
                TreeNode::Leaf { positive_fraction, .. } => return Ok(*positive_fraction),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_features(x)?;
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }

    fn check_features(&self, x: &Array2<f64>) -> Result<()> {
        if self.root.is_none() {
            return Err(MortalityError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(MortalityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }
}

fn gini(count: usize, positives: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let p = positives as f64 / count as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}
