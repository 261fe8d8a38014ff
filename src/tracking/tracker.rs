//! Experiment tracker
//!
//! Records one run per successful training with its params and metrics.

use super::storage::StorageBackend;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Opaque reference to a logged run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunRef(pub String);

impl fmt::Display for RunRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A run within an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub logged_at: DateTime<Utc>,
    pub params: Map<String, Value>,
    pub metrics: BTreeMap<String, f64>,
}

/// An experiment containing multiple runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experiment_id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            runs: Vec::new(),
        }
    }

    /// Run with the highest value of `metric`
    pub fn best_run(&self, metric: &str) -> Option<&Run> {
        self.runs
            .iter()
            .filter(|r| r.metrics.contains_key(metric))
            .max_by(|a, b| a.metrics[metric].total_cmp(&b.metrics[metric]))
    }
}

/// Sink for training runs.
///
/// A failing tracker never fails training; callers log and carry on.
pub trait ExperimentTracker: Send + Sync {
    fn log_run(
        &self,
        experiment: &str,
        params: &Map<String, Value>,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<RunRef>;

    fn experiment(&self, name: &str) -> Result<Option<Experiment>>;
}

/// Tracker holding experiments in memory, optionally persisted after each run
pub struct Tracker {
    storage: Option<Box<dyn StorageBackend>>,
    experiments: RwLock<BTreeMap<String, Experiment>>,
}

impl Tracker {
    pub fn in_memory() -> Self {
        Self {
            storage: None,
            experiments: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a tracker over `storage`, loading what it already holds
    pub fn with_storage(storage: Box<dyn StorageBackend>) -> Result<Self> {
        let experiments = storage
            .load_experiments()?
            .into_iter()
            .map(|e| (e.name.clone(), e))
            .collect();
        Ok(Self {
            storage: Some(storage),
            experiments: RwLock::new(experiments),
        })
    }

    pub fn list_experiments(&self) -> Vec<Experiment> {
        self.experiments.read().values().cloned().collect()
    }
}

impl ExperimentTracker for Tracker {
    fn log_run(
        &self,
        experiment: &str,
        params: &Map<String, Value>,
        metrics: &BTreeMap<String, f64>,
    ) -> Result<RunRef> {
        let run_id = Uuid::new_v4().to_string();
        let mut experiments = self.experiments.write();

        let entry = experiments
            .entry(experiment.to_string())
            .or_insert_with(|| Experiment::new(experiment));
        let run_name = format!("run_{}", entry.runs.len() + 1);
        entry.runs.push(Run {
            run_id: run_id.clone(),
            run_name,
            logged_at: Utc::now(),
            params: params.clone(),
            metrics: metrics.clone(),
        });

        if let Some(storage) = &self.storage {
            let snapshot: Vec<Experiment> = experiments.values().cloned().collect();
            if let Err(e) = storage.save_experiments(&snapshot) {
                // Keep memory and disk consistent
                if let Some(exp) = experiments.get_mut(experiment) {
                    exp.runs.retain(|r| r.run_id != run_id);
                }
                return Err(e);
            }
        }

        debug!(experiment, run_id = %run_id, "Logged run");
        Ok(RunRef(run_id))
    }

    fn experiment(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.read().get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::LocalStorage;
    use serde_json::json;

    fn metrics(f1: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("f1_score".to_string(), f1)])
    }

    #[test]
    fn test_log_runs_grouped_by_experiment() {
        let tracker = Tracker::in_memory();
        let params = json!({"n_estimators": 10}).as_object().unwrap().clone();

        let first = tracker.log_run("exp", &params, &metrics(0.7)).unwrap();
        let second = tracker.log_run("exp", &params, &metrics(0.9)).unwrap();
        assert_ne!(first, second);

        let exp = tracker.experiment("exp").unwrap().unwrap();
        assert_eq!(exp.runs.len(), 2);
        assert_eq!(exp.best_run("f1_score").unwrap().run_id, second.0);
        assert!(tracker.experiment("other").unwrap().is_none());
    }

    #[test]
    fn test_local_storage_persists_runs() {
        let dir = tempfile::tempdir().unwrap();
        {
            let tracker =
                Tracker::with_storage(Box::new(LocalStorage::new(dir.path().to_path_buf()))).unwrap();
            tracker.log_run("exp", &Map::new(), &metrics(0.5)).unwrap();
        }

        let reopened =
            Tracker::with_storage(Box::new(LocalStorage::new(dir.path().to_path_buf()))).unwrap();
        let exp = reopened.experiment("exp").unwrap().unwrap();
        assert_eq!(exp.runs.len(), 1);
        assert_eq!(exp.runs[0].metrics["f1_score"], 0.5);
    }
}
