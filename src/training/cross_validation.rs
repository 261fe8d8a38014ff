//! Train/validation splitting and stratified k-fold

use crate::error::{MortalityError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

impl CVSplit {
    /// Materialize the split as (x_train, x_test, y_train, y_test)
    pub fn select(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
        (
            x.select(Axis(0), &self.train_indices),
            x.select(Axis(0), &self.test_indices),
            y.select(Axis(0), &self.train_indices),
            y.select(Axis(0), &self.test_indices),
        )
    }
}

/// Stratified k-fold splitter with a seeded shuffle
#[derive(Debug, Clone)]
pub struct CrossValidator {
    n_splits: usize,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: 42,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate folds that keep the class ratio of `y`.
    ///
    /// Each class is shuffled on its own and dealt round-robin; the deal
    /// continues across classes so fold sizes differ by at most one.
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(MortalityError::Validation("n_splits must be at least 2".to_string()));
        }
        if n_samples < self.n_splits {
            return Err(MortalityError::Validation(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in y.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut dealt = 0usize;

        for indices in class_indices.values_mut() {
            indices.shuffle(&mut rng);
            for &idx in indices.iter() {
                folds[dealt % self.n_splits].push(idx);
                dealt += 1;
            }
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect();

        Ok(splits)
    }
}

/// Shuffled holdout split; `test_ratio` of the rows (rounded up) go to test
pub fn train_test_split(n_samples: usize, test_ratio: f64, seed: u64) -> Result<CVSplit> {
    if !(0.0..1.0).contains(&test_ratio) {
        return Err(MortalityError::Validation(format!(
            "test ratio must be in [0, 1), got {}",
            test_ratio
        )));
    }

    let n_test = (n_samples as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(MortalityError::Validation(format!(
            "cannot split {} rows into train and validation sets",
            n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test, train) = indices.split_at(n_test);
    Ok(CVSplit {
        train_indices: train.to_vec(),
        test_indices: test.to_vec(),
        fold_idx: 0,
    })
}
