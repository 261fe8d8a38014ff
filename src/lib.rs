//! mortality-ml - training, registry and serving engine for respiratory
//! mortality classifiers
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - Record validation, feature engineering and the fit/transform pipeline
//! - [`training`] - Random forest and logistic regression training, metrics and grid search
//! - [`tracking`] - Experiment tracking
//! - [`registry`] - Versioned model storage with one active model per family
//! - [`jobs`] - Asynchronous training jobs
//!
//! ## Serving
//! - [`prediction`] - Predictions from the active model and the prediction log
//! - [`data`] - Training data sources and CSV import
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

pub mod config;
pub mod error;

pub mod preprocessing;
pub mod registry;
pub mod tracking;
pub mod training;

pub mod data;
pub mod jobs;
pub mod prediction;

pub mod cli;
pub mod server;

pub use error::{ErrorKind, MortalityError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::data::{DataStore, InMemoryDataStore};
    pub use crate::error::{MortalityError, Result};
    pub use crate::jobs::{JobOrchestrator, JobState, TrainingRequest};
    pub use crate::preprocessing::{FeatureInput, FeaturePipeline, PipelineState, RawRecord};
    pub use crate::prediction::{PredictionService, RiskLevel};
    pub use crate::registry::{ActiveModel, LoadedModel, ModelRegistry, RetentionPolicy};
    pub use crate::tracking::{ExperimentTracker, Tracker};
    pub use crate::training::{Hyperparameters, ModelFamily, TrainEngine, TrainedModel};
}
