//! Training engine implementation

use super::cross_validation::{train_test_split, CrossValidator};
use super::family::{Hyperparameters, ModelFamily};
use super::metrics::ClassificationMetrics;
use super::models::TrainedModel;
use crate::error::{MortalityError, Result};
use crate::tracking::{ExperimentTracker, RunRef};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const VALIDATION_RATIO: f64 = 0.2;
const SPLIT_SEED: u64 = 42;
const CV_FOLDS: usize = 5;

/// Result of a single training call
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    /// Computed on the held-out validation rows only
    pub metrics: ClassificationMetrics,
    pub params: Hyperparameters,
    /// `None` when the tracker could not record the run
    pub run_ref: Option<RunRef>,
    pub n_train: usize,
    pub n_validation: usize,
    pub training_time_secs: f64,
}

/// Bounds on a grid search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneLimits {
    /// Candidates evaluated, taken from the front of the grid
    pub max_candidates: usize,
}

impl Default for TuneLimits {
    fn default() -> Self {
        Self { max_candidates: 128 }
    }
}

/// Outcome of `tune`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub best_params: Hyperparameters,
    /// Mean weighted F1 over the CV folds
    pub best_score: f64,
    pub evaluated: usize,
}

/// Fits, evaluates and tunes classifiers
#[derive(Clone)]
pub struct TrainEngine {
    tracker: Arc<dyn ExperimentTracker>,
    validation_ratio: f64,
    split_seed: u64,
    cv_folds: usize,
}

impl TrainEngine {
    pub fn new(tracker: Arc<dyn ExperimentTracker>) -> Self {
        Self {
            tracker,
            validation_ratio: VALIDATION_RATIO,
            split_seed: SPLIT_SEED,
            cv_folds: CV_FOLDS,
        }
    }

    /// Override the number of CV folds used by `tune`
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Fit on a seeded 80/20 split and score on the held-out rows.
    ///
    /// The run is logged to the experiment tracker; a tracker failure is
    /// logged and leaves `run_ref` empty.
    pub fn train(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        family: ModelFamily,
        params: Option<Hyperparameters>,
        experiment: &str,
    ) -> Result<TrainingOutcome> {
        check_shapes(x, y)?;
        let params = resolve_params(family, params)?;
        let start = Instant::now();

        let split = train_test_split(x.nrows(), self.validation_ratio, self.split_seed)?;
        let (x_train, x_val, y_train, y_val) = split.select(x, y);

        let model = TrainedModel::fit(&params, &x_train, &y_train)?;

        let y_pred = model.predict(&x_val)?;
        let y_prob = model.predict_proba(&x_val)?;
        let metrics = ClassificationMetrics::compute(&y_val, &y_pred, Some(&y_prob));
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            family = %family,
            n_train = y_train.len(),
            n_validation = y_val.len(),
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            auc = metrics.auc,
            elapsed_secs = training_time_secs,
            "Model trained"
        );

        let run_ref = match self.tracker.log_run(experiment, &params.to_map(), &metric_map(&metrics)) {
            Ok(run) => Some(run),
            Err(e) => {
                warn!(error = %e, experiment, "Experiment tracking failed; continuing without run ref");
                None
            }
        };

        Ok(TrainingOutcome {
            model,
            metrics,
            params,
            run_ref,
            n_train: y_train.len(),
            n_validation: y_val.len(),
            training_time_secs,
        })
    }

    /// Grid search scored by stratified k-fold mean weighted F1.
    ///
    /// Candidates run in parallel; the winner is picked in grid order so the
    /// earliest candidate wins ties and repeated calls agree.
    pub fn tune(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        family: ModelFamily,
        limits: TuneLimits,
    ) -> Result<TuningResult> {
        check_shapes(x, y)?;
        if limits.max_candidates == 0 {
            return Err(MortalityError::Validation("max_candidates must be at least 1".to_string()));
        }

        let candidates: Vec<Hyperparameters> =
            family.grid().into_iter().take(limits.max_candidates).collect();
        let folds = CrossValidator::new(self.cv_folds)
            .with_random_state(self.split_seed)
            .split(y)?;

        let start = Instant::now();
        let scores = candidates
            .par_iter()
            .map(|params| -> Result<f64> {
                let mut total = 0.0;
                for fold in &folds {
                    let (x_train, x_test, y_train, y_test) = fold.select(x, y);
                    let model = TrainedModel::fit(params, &x_train, &y_train)?;
                    let y_pred = model.predict(&x_test)?;
                    total += ClassificationMetrics::compute(&y_test, &y_pred, None).f1_score;
                }
                Ok(total / folds.len() as f64)
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut best_idx = 0;
        for (idx, &score) in scores.iter().enumerate() {
            debug!(candidate = idx, score, "Scored candidate");
            if score > scores[best_idx] {
                best_idx = idx;
            }
        }

        info!(
            family = %family,
            evaluated = candidates.len(),
            best_score = scores[best_idx],
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Hyperparameter search finished"
        );

        Ok(TuningResult {
            best_params: candidates[best_idx].clone(),
            best_score: scores[best_idx],
            evaluated: candidates.len(),
        })
    }
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MortalityError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(MortalityError::Validation("no rows to train on".to_string()));
    }
    Ok(())
}

fn resolve_params(family: ModelFamily, params: Option<Hyperparameters>) -> Result<Hyperparameters> {
    let params = params.unwrap_or_else(|| family.default_params());
    if params.family() != family {
        return Err(MortalityError::Validation(format!(
            "{} hyperparameters supplied for {}",
            params.family(),
            family
        )));
    }
    params.validate()?;
    Ok(params)
}

fn metric_map(metrics: &ClassificationMetrics) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("accuracy".to_string(), metrics.accuracy),
        ("precision".to_string(), metrics.precision),
        ("recall".to_string(), metrics.recall),
        ("f1_score".to_string(), metrics.f1_score),
        ("auc".to_string(), metrics.auc),
    ])
}
