//! Model artifact metadata rows

use super::versioning::ModelVersion;
use crate::tracking::RunRef;
use crate::training::{ClassificationMetrics, Hyperparameters, ModelFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata row for one stored model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub id: Uuid,
    /// Unique across the registry
    pub name: String,
    pub family: ModelFamily,
    pub version: ModelVersion,
    pub metrics: ClassificationMetrics,
    pub is_active: bool,
    pub hyperparameters: Hyperparameters,
    pub created_at: DateTime<Utc>,
    pub model_key: String,
    pub pipeline_key: String,
    pub run_ref: Option<RunRef>,
    pub n_training_records: usize,
    /// Bumped on every change to the row
    pub row_version: u64,
}

/// Caller-supplied fields for a new artifact
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub name: String,
    pub metrics: ClassificationMetrics,
    pub hyperparameters: Hyperparameters,
    pub run_ref: Option<RunRef>,
    pub n_training_records: usize,
}

impl NewArtifact {
    /// Default artifact name: `{family}_{YYYYmmdd_HHMMSS}`
    pub fn default_name(family: ModelFamily, at: DateTime<Utc>) -> String {
        format!("{}_{}", family, at.format("%Y%m%d_%H%M%S"))
    }
}

/// Row filter for listing artifacts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFilter {
    pub family: Option<ModelFamily>,
    pub is_active: Option<bool>,
}

impl ArtifactFilter {
    pub fn family(family: ModelFamily) -> Self {
        Self {
            family: Some(family),
            is_active: None,
        }
    }

    pub fn matches(&self, artifact: &ModelArtifact) -> bool {
        self.family.map_or(true, |f| f == artifact.family)
            && self.is_active.map_or(true, |a| a == artifact.is_active)
    }
}

pub(crate) fn model_key(name: &str) -> String {
    format!("models/{}.bin", name)
}

pub(crate) fn pipeline_key(name: &str) -> String {
    format!("models/{}.pipeline.bin", name)
}
