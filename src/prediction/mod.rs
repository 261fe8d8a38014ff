//! Prediction serving and the prediction log

mod log;
mod service;

pub use log::{InMemoryPredictionLog, LogQuery, PredictionLogEntry, PredictionLogStore, MAX_LOG_LIMIT};
pub use service::{FeatureImportance, Prediction, PredictionService, RiskLevel};
