//! Experiment Tracking Module
//!
//! Logs training runs (params and metrics) per named experiment.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentTracker, Run, RunRef, Tracker};
