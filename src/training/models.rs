//! Trained model variants

use super::family::{Hyperparameters, ModelFamily};
use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A fitted classifier of one of the supported families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
}

impl TrainedModel {
    /// Fit a new model of the family `params` belongs to
    pub fn fit(params: &Hyperparameters, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        match params {
            Hyperparameters::RandomForest(p) => {
                let mut model = RandomForest::from_params(p);
                model.fit(x, y)?;
                Ok(TrainedModel::RandomForest(model))
            }
            Hyperparameters::LogisticRegression(p) => {
                let mut model = LogisticRegression::from_params(p);
                model.fit(x, y)?;
                Ok(TrainedModel::LogisticRegression(model))
            }
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            TrainedModel::RandomForest(_) => ModelFamily::RandomForest,
            TrainedModel::LogisticRegression(_) => ModelFamily::LogisticRegression,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict(x),
            TrainedModel::LogisticRegression(m) => m.predict(x),
        }
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.predict_proba(x),
            TrainedModel::LogisticRegression(m) => m.predict_proba(x),
        }
    }

    /// Tree importances for forests, absolute coefficients for linear models
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances().cloned(),
            TrainedModel::LogisticRegression(m) => m.coefficients.as_ref().map(|c| c.mapv(f64::abs)),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
