//! Random Forest classifier

use super::decision_tree::DecisionTree;
use super::family::RandomForestParams;
use crate::error::{MortalityError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of Gini trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::from_params(&RandomForestParams::default())
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: true,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn from_params(params: &RandomForestParams) -> Self {
        Self::new(params.n_estimators)
            .with_max_depth(params.max_depth)
            .with_min_samples_split(params.min_samples_split)
            .with_min_samples_leaf(params.min_samples_leaf)
            .with_random_state(params.random_state)
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

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// sqrt(n_features), at least one
    fn max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt().floor() as usize).max(1)
    }

    /// Fit the forest; trees are built in parallel, each from its own seed
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MortalityError::Training("cannot fit a forest on zero rows".to_string()));
        }

        self.n_features = n_features;
        let max_features = Self::max_features(n_features);
        let base_seed = self.random_state;

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean of the per-tree leaf positive fractions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MortalityError::ModelNotFitted);
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba: Array1<f64> = Array1::zeros(x.nrows());
        for p in &per_tree {
            proba += p;
        }
        proba /= per_tree.len() as f64;
        Ok(proba)
    }

    /// Class labels; ties at 0.5 go to the negative class
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [0.3, 0.1],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
            [1.3, 1.1],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(15).with_min_samples_split(2);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let accuracy = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count() as f64
            / y.len() as f64;

        assert!(accuracy >= 0.8, "Accuracy too low: {}", accuracy);
        assert_eq!(rf.n_trees(), 15);
    }

    #[test]
    fn test_probabilities_in_range() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(10);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = blobs();
        let mut a = RandomForest::new(8).with_random_state(7);
        let mut b = RandomForest::new(8).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances_sum_to_one() {
        let (x, y) = blobs();
        let mut rf = RandomForest::new(10);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted() {
        let rf = RandomForest::new(3);
        assert!(matches!(rf.predict(&array![[0.0, 0.0]]), Err(MortalityError::ModelNotFitted)));
    }
}
