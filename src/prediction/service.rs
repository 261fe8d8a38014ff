//! Serving predictions from the active model

use super::log::{LogQuery, PredictionLogEntry, PredictionLogStore};
use crate::error::{MortalityError, Result};
use crate::preprocessing::{FeatureInput, FeaturePipeline};
use crate::registry::{ActiveModel, LoadedModel, ModelRegistry};
use crate::training::ModelFamily;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.7 {
            RiskLevel::High
        } else if probability >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 for high mortality
    pub prediction: u8,
    /// Positive-class probability
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub features: FeatureInput,
    pub model_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    logs: Arc<dyn PredictionLogStore>,
    pipeline: FeaturePipeline,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>, logs: Arc<dyn PredictionLogStore>) -> Self {
        Self {
            registry,
            logs,
            pipeline: FeaturePipeline::new(),
        }
    }

    /// Load the active model of `family`, failing when there is none
    pub fn active(&self, family: ModelFamily) -> Result<LoadedModel> {
        match self.registry.load_active(family)? {
            ActiveModel::Loaded(loaded) => Ok(loaded),
            ActiveModel::NoActiveModel => {
                Err(MortalityError::NotFound(format!("no active {} model", family)))
            }
            ActiveModel::MissingBinary { artifact_id, key } => Err(MortalityError::Storage(format!(
                "active model {} is missing blob {}",
                artifact_id, key
            ))),
        }
    }

    /// Transform with the model's own pipeline state, predict, and log
    pub fn predict(&self, loaded: &LoadedModel, inputs: &[FeatureInput]) -> Result<Vec<Prediction>> {
        if inputs.is_empty() {
            return Err(MortalityError::Validation("no inputs to predict".to_string()));
        }
        let start = Instant::now();

        let matrix = self.pipeline.transform(inputs, &loaded.pipeline)?;
        let probabilities = loaded.model.predict_proba(&matrix.values)?;
        let classes = loaded.model.predict(&matrix.values)?;

        let predictions: Vec<Prediction> = inputs
            .iter()
            .zip(probabilities.iter().zip(classes.iter()))
            .map(|(input, (&probability, &class))| Prediction {
                prediction: u8::from(class > 0.5),
                probability,
                risk_level: RiskLevel::from_probability(probability),
                features: input.clone(),
                model_id: loaded.artifact.id,
            })
            .collect();

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        let now = Utc::now();
        let entries = predictions
            .iter()
            .map(|p| {
                Ok(PredictionLogEntry {
                    id: Uuid::new_v4(),
                    model_id: p.model_id,
                    input_features: serde_json::to_value(&p.features)?,
                    prediction: p.prediction,
                    probability: p.probability,
                    latency_ms,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if let Err(e) = self.logs.append(entries) {
            warn!(model_id = %loaded.artifact.id, error = %e, "Failed to record predictions");
        }

        debug!(
            model_id = %loaded.artifact.id,
            n = predictions.len(),
            latency_ms,
            "Served predictions"
        );
        Ok(predictions)
    }

    /// Predict with the active model of `family`
    pub fn predict_active(&self, family: ModelFamily, inputs: &[FeatureInput]) -> Result<Vec<Prediction>> {
        let loaded = self.active(family)?;
        self.predict(&loaded, inputs)
    }

    pub fn query_logs(&self, query: &LogQuery) -> Result<Vec<PredictionLogEntry>> {
        query.validate()?;
        self.logs.query(query)
    }

    /// Feature names paired with importances, highest first
    pub fn feature_importance(&self, loaded: &LoadedModel) -> Result<Vec<FeatureImportance>> {
        let importances = loaded.model.feature_importances().ok_or_else(|| {
            MortalityError::Validation("model does not expose feature importances".to_string())
        })?;
        let names = loaded.pipeline.feature_columns();
        if names.len() != importances.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("{} importances", names.len()),
                actual: importances.len().to_string(),
            });
        }

        let mut ranked: Vec<FeatureImportance> = names
            .iter()
            .zip(importances.iter())
            .map(|(name, &importance)| FeatureImportance {
                feature: name.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_records;
    use crate::prediction::InMemoryPredictionLog;
    use crate::registry::{InMemoryArtifactStore, LocalMetadataStore, NewArtifact};
    use crate::training::TrainedModel;

    fn service_with_model() -> (PredictionService, Arc<InMemoryPredictionLog>, Vec<FeatureInput>) {
        let registry = Arc::new(ModelRegistry::new(
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(LocalMetadataStore::in_memory()),
        ));
        let logs = Arc::new(InMemoryPredictionLog::default());
        let service = PredictionService::new(Arc::clone(&registry), logs.clone());

        let records = sample_records(200, 5);
        let fitted = FeaturePipeline::new().fit_transform(&records).unwrap();
        let params = ModelFamily::RandomForest
            .parse_params(Some(&serde_json::from_str(r#"{"n_estimators": 10}"#).unwrap()))
            .unwrap();
        let model = TrainedModel::fit(&params, &fitted.features.values, &fitted.labels).unwrap();
        registry
            .save_and_activate(
                &model,
                NewArtifact {
                    name: "rf_test".to_string(),
                    metrics: Default::default(),
                    hyperparameters: params,
                    run_ref: None,
                    n_training_records: 200,
                },
                &fitted.state,
            )
            .unwrap();

        let inputs = records
            .iter()
            .take(3)
            .map(|r| FeatureInput {
                county: r.county.clone().unwrap_or_default(),
                ten_year_age_groups: r.ten_year_age_groups.clone().unwrap_or_default(),
                gender: r.gender.clone().unwrap_or_default(),
                year: r.year.unwrap_or_default(),
                population: r.population.unwrap_or_default(),
                state: r.state.clone().unwrap_or_default(),
            })
            .collect();
        (service, logs, inputs)
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(0.69), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.39), RiskLevel::Low);
    }

    #[test]
    fn test_predict_logs_every_input() {
        let (service, logs, inputs) = service_with_model();
        let predictions = service.predict_active(ModelFamily::RandomForest, &inputs).unwrap();

        assert_eq!(predictions.len(), 3);
        for p in &predictions {
            assert!((0.0..=1.0).contains(&p.probability));
            assert_eq!(p.prediction == 1, p.probability > 0.5);
            assert_eq!(p.risk_level, RiskLevel::from_probability(p.probability));
        }
        assert_eq!(logs.count(), 3);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let (service, logs, mut inputs) = service_with_model();
        inputs[0].county = "Atlantis County".to_string();
        let err = service.predict_active(ModelFamily::RandomForest, &inputs).unwrap_err();
        assert!(matches!(err, MortalityError::UnknownCategory { .. }));
        assert_eq!(logs.count(), 0);
    }

    #[test]
    fn test_no_active_model() {
        let (service, _, inputs) = service_with_model();
        let err = service.predict_active(ModelFamily::LogisticRegression, &inputs).unwrap_err();
        assert!(matches!(err, MortalityError::NotFound(_)));
    }

    #[test]
    fn test_feature_importance_sorted() {
        let (service, _, _) = service_with_model();
        let loaded = service.active(ModelFamily::RandomForest).unwrap();
        let ranked = service.feature_importance(&loaded).unwrap();

        assert_eq!(ranked.len(), 6);
        assert!(ranked.windows(2).all(|w| w[0].importance >= w[1].importance));
    }
}
