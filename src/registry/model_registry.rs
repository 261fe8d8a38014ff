//! Model registry: storage, activation and retention of trained models

use super::artifact::{model_key, pipeline_key, ArtifactFilter, ModelArtifact, NewArtifact};
use super::store::{ArtifactStore, MetadataStore};
use super::versioning::ModelVersion;
use crate::error::{MortalityError, Result};
use crate::preprocessing::PipelineState;
use crate::training::{ModelFamily, TrainedModel};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Proof that an activation was prepared against a given generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationTicket {
    pub artifact_id: Uuid,
    pub family: ModelFamily,
    pub generation: u64,
}

/// Active model with its pipeline state, decoded and immutable
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub artifact: ModelArtifact,
    pub model: Arc<TrainedModel>,
    pub pipeline: Arc<PipelineState>,
}

/// Result of `load_active`
#[derive(Debug, Clone)]
pub enum ActiveModel {
    Loaded(LoadedModel),
    NoActiveModel,
    /// The metadata row is active but a blob is missing from the store
    MissingBinary { artifact_id: Uuid, key: String },
}

/// Which old inactive artifacts `retire` may delete
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    /// Best-F1 candidates kept per family
    pub keep_best: usize,
    /// Upper bound on deletions per sweep
    pub max_deletions: usize,
}

impl RetentionPolicy {
    pub fn new(max_age_days: i64, keep_best: usize) -> Self {
        Self {
            max_age: Duration::days(max_age_days),
            keep_best,
            max_deletions: 1000,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(30, 3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetirementReport {
    pub candidates: usize,
    pub kept: usize,
    pub deleted: Vec<Uuid>,
    /// Set when `max_deletions` stopped the sweep early
    pub truncated: bool,
}

/// Stores models, keeps at most one active per family, and retires stale ones
pub struct ModelRegistry {
    artifacts: Arc<dyn ArtifactStore>,
    metadata: Arc<dyn MetadataStore>,
    activation_locks: HashMap<ModelFamily, Mutex<()>>,
    saves: Mutex<()>,
}

/// Which writes of one save have landed
#[derive(Debug, Default)]
struct Written {
    model: bool,
    pipeline: bool,
    row: bool,
}

impl ModelRegistry {
    pub fn new(artifacts: Arc<dyn ArtifactStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        let activation_locks = ModelFamily::ALL.iter().map(|&f| (f, Mutex::new(()))).collect();
        Self {
            artifacts,
            metadata,
            activation_locks,
            saves: Mutex::new(()),
        }
    }

    fn lock_for(&self, family: ModelFamily) -> Result<&Mutex<()>> {
        self.activation_locks
            .get(&family)
            .ok_or_else(|| MortalityError::UnsupportedModelFamily(family.to_string()))
    }

    /// Next version for `family`: minor bump of its highest, or 1.0.0.
    ///
    /// Callers hold `saves` so two saves never draw the same version.
    fn next_version(&self, family: ModelFamily) -> Result<ModelVersion> {
        Ok(self
            .metadata
            .list(&ArtifactFilter::family(family))?
            .iter()
            .map(|a| a.version)
            .max()
            .map_or_else(ModelVersion::default, |v| v.bump_minor()))
    }

    /// Store both blobs, insert the row inactive, then activate it.
    ///
    /// Saves are serialized from the name check to the activation, so the
    /// name, version and blob keys of a save belong to it alone. A failure
    /// removes only what this call wrote.
    pub fn save_and_activate(
        &self,
        model: &TrainedModel,
        new: NewArtifact,
        pipeline: &PipelineState,
    ) -> Result<ModelArtifact> {
        let family = model.family();
        if new.hyperparameters.family() != family {
            return Err(MortalityError::Validation(format!(
                "{} hyperparameters recorded for a {} model",
                new.hyperparameters.family(),
                family
            )));
        }
        validate_name(&new.name)?;

        let model_bytes = model.to_bytes()?;
        let pipeline_bytes = pipeline.to_bytes()?;

        let _save = self.saves.lock();
        if self.name_taken(&new.name)? {
            return Err(MortalityError::Validation(format!(
                "artifact name {} already exists",
                new.name
            )));
        }

        let artifact = ModelArtifact {
            id: Uuid::new_v4(),
            model_key: model_key(&new.name),
            pipeline_key: pipeline_key(&new.name),
            name: new.name,
            family,
            version: self.next_version(family)?,
            metrics: new.metrics,
            is_active: false,
            hyperparameters: new.hyperparameters,
            created_at: Utc::now(),
            run_ref: new.run_ref,
            n_training_records: new.n_training_records,
            row_version: 0,
        };

        let mut written = Written::default();
        match self.store_and_activate(&artifact, model_bytes, pipeline_bytes, &mut written) {
            Ok(active) => {
                info!(
                    model_id = %active.id,
                    name = %active.name,
                    family = %family,
                    version = %active.version,
                    f1 = active.metrics.f1_score,
                    "Model saved and activated"
                );
                Ok(active)
            }
            Err(e) => {
                warn!(name = %artifact.name, error = %e, "Save failed, removing partial artifact");
                self.compensate(&artifact, &written);
                Err(e)
            }
        }
    }

    fn store_and_activate(
        &self,
        artifact: &ModelArtifact,
        model_bytes: Vec<u8>,
        pipeline_bytes: Vec<u8>,
        written: &mut Written,
    ) -> Result<ModelArtifact> {
        self.artifacts.put(&artifact.model_key, model_bytes)?;
        written.model = true;
        self.artifacts.put(&artifact.pipeline_key, pipeline_bytes)?;
        written.pipeline = true;
        self.metadata.insert(artifact.clone())?;
        written.row = true;
        self.activate(artifact.id)
    }

    fn compensate(&self, artifact: &ModelArtifact, written: &Written) {
        if written.row {
            if let Err(e) = self.metadata.delete(artifact.id) {
                error!(model_id = %artifact.id, error = %e, "Failed to remove metadata row");
            }
        }
        for (put, key) in [
            (written.model, &artifact.model_key),
            (written.pipeline, &artifact.pipeline_key),
        ] {
            if !put {
                continue;
            }
            if let Err(e) = self.artifacts.delete(key) {
                error!(key = %key, error = %e, "Failed to remove blob");
            }
        }
    }

    /// Read the family's activation generation for a later `commit_activation`
    pub fn prepare_activation(&self, id: Uuid) -> Result<ActivationTicket> {
        let artifact = self.get(id)?;
        Ok(ActivationTicket {
            artifact_id: id,
            family: artifact.family,
            generation: self.metadata.activation_generation(artifact.family)?,
        })
    }

    /// Activate if no other activation of the family happened since the ticket.
    ///
    /// Fails with `ActivationConflict` when another activation holds the
    /// family lock or has already moved the generation.
    pub fn commit_activation(&self, ticket: ActivationTicket) -> Result<ModelArtifact> {
        let _guard = self.lock_for(ticket.family)?.try_lock().ok_or_else(|| {
            MortalityError::ActivationConflict(format!(
                "another {} activation is in progress",
                ticket.family
            ))
        })?;
        self.metadata.activate(ticket.artifact_id, ticket.generation)
    }

    /// Make `id` the single active model of its family
    pub fn activate(&self, id: Uuid) -> Result<ModelArtifact> {
        let ticket = self.prepare_activation(id)?;
        let artifact = self.commit_activation(ticket)?;
        info!(model_id = %id, family = %artifact.family, "Model activated");
        Ok(artifact)
    }

    /// Decode the active model of `family` together with its pipeline state
    pub fn load_active(&self, family: ModelFamily) -> Result<ActiveModel> {
        let active = self.metadata.list(&ArtifactFilter {
            family: Some(family),
            is_active: Some(true),
        })?;
        let Some(artifact) = active.into_iter().next() else {
            return Ok(ActiveModel::NoActiveModel);
        };

        let Some(model_bytes) = self.artifacts.get(&artifact.model_key)? else {
            warn!(model_id = %artifact.id, key = %artifact.model_key, "Active model binary missing");
            return Ok(ActiveModel::MissingBinary {
                artifact_id: artifact.id,
                key: artifact.model_key,
            });
        };
        let Some(pipeline_bytes) = self.artifacts.get(&artifact.pipeline_key)? else {
            warn!(model_id = %artifact.id, key = %artifact.pipeline_key, "Active pipeline state missing");
            return Ok(ActiveModel::MissingBinary {
                artifact_id: artifact.id,
                key: artifact.pipeline_key,
            });
        };

        Ok(ActiveModel::Loaded(LoadedModel {
            model: Arc::new(TrainedModel::from_bytes(&model_bytes)?),
            pipeline: Arc::new(PipelineState::from_bytes(&pipeline_bytes)?),
            artifact,
        }))
    }

    /// Delete old inactive artifacts, keeping the best `keep_best` per family
    pub fn retire(&self, policy: RetentionPolicy, now: DateTime<Utc>) -> Result<RetirementReport> {
        let cutoff = now - policy.max_age;
        let mut groups: BTreeMap<ModelFamily, Vec<ModelArtifact>> = BTreeMap::new();
        for artifact in self.metadata.list(&ArtifactFilter::default())? {
            if !artifact.is_active && artifact.created_at < cutoff {
                groups.entry(artifact.family).or_default().push(artifact);
            }
        }

        let mut report = RetirementReport::default();

        'families: for (family, mut candidates) in groups {
            report.candidates += candidates.len();
            candidates.sort_by(|a, b| {
                b.metrics
                    .f1_score
                    .total_cmp(&a.metrics.f1_score)
                    .then(b.created_at.cmp(&a.created_at))
            });

            let keep = policy.keep_best.min(candidates.len());
            report.kept += keep;

            // Hold the family lock so nothing is activated mid-sweep
            let _guard = self.lock_for(family)?.lock();
            for artifact in candidates.into_iter().skip(keep) {
                if report.deleted.len() >= policy.max_deletions {
                    report.truncated = true;
                    break 'families;
                }

                match self.metadata.get(artifact.id)? {
                    Some(current) if !current.is_active => {}
                    _ => {
                        report.kept += 1;
                        continue;
                    }
                }

                self.metadata.delete(artifact.id)?;
                for key in [&artifact.model_key, &artifact.pipeline_key] {
                    if let Err(e) = self.artifacts.delete(key) {
                        warn!(key = %key, error = %e, "Orphaned blob left behind");
                    }
                }
                report.deleted.push(artifact.id);
            }
        }

        info!(
            candidates = report.candidates,
            kept = report.kept,
            deleted = report.deleted.len(),
            truncated = report.truncated,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Rows matching `filter`, newest first
    pub fn list(&self, filter: &ArtifactFilter) -> Result<Vec<ModelArtifact>> {
        let mut rows = self.metadata.list(filter)?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.version.cmp(&a.version)));
        Ok(rows)
    }

    pub fn name_taken(&self, name: &str) -> Result<bool> {
        Ok(self
            .metadata
            .list(&ArtifactFilter::default())?
            .iter()
            .any(|a| a.name == name))
    }

    pub fn get(&self, id: Uuid) -> Result<ModelArtifact> {
        self.metadata
            .get(id)?
            .ok_or_else(|| MortalityError::NotFound(format!("model {}", id)))
    }

    /// Rows sorted by validation F1, best first
    pub fn compare(&self, family: Option<ModelFamily>) -> Result<Vec<ModelArtifact>> {
        let mut rows = self.metadata.list(&ArtifactFilter {
            family,
            is_active: None,
        })?;
        rows.sort_by(|a, b| b.metrics.f1_score.total_cmp(&a.metrics.f1_score));
        Ok(rows)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(MortalityError::Validation(format!("invalid artifact name: {:?}", name)))
    }
}
