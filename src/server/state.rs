//! Application state shared across handlers

use crate::config::Settings;
use crate::data::InMemoryDataStore;
use crate::error::Result;
use crate::jobs::{JobOrchestrator, OrchestratorConfig};
use crate::prediction::{InMemoryPredictionLog, PredictionService};
use crate::registry::{
    ArtifactStore, FsArtifactStore, InMemoryArtifactStore, LocalMetadataStore, MetadataStore,
    ModelRegistry,
};
use crate::tracking::{ExperimentTracker, LocalStorage, Tracker};
use crate::training::TrainEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AppState {
    pub settings: Settings,
    pub data: Arc<InMemoryDataStore>,
    pub registry: Arc<ModelRegistry>,
    pub jobs: JobOrchestrator,
    pub predictions: PredictionService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State backed by the model and tracking directories in `settings`
    pub fn open(settings: Settings) -> Result<Self> {
        let artifacts = Arc::new(FsArtifactStore::open(&settings.models_dir)?);
        let metadata = Arc::new(LocalMetadataStore::open(&settings.models_dir)?);
        let tracker = Arc::new(Tracker::with_storage(Box::new(LocalStorage::new(
            settings.tracking_dir.clone(),
        )))?);
        Ok(Self::assemble(settings, artifacts, metadata, tracker))
    }

    /// State with every store in memory
    pub fn in_memory(settings: Settings) -> Self {
        Self::assemble(
            settings,
            Arc::new(InMemoryArtifactStore::new()),
            Arc::new(LocalMetadataStore::in_memory()),
            Arc::new(Tracker::in_memory()),
        )
    }

    fn assemble(
        settings: Settings,
        artifacts: Arc<dyn ArtifactStore>,
        metadata: Arc<dyn MetadataStore>,
        tracker: Arc<dyn ExperimentTracker>,
    ) -> Self {
        let data = Arc::new(InMemoryDataStore::new());
        let registry = Arc::new(ModelRegistry::new(artifacts, metadata));
        let jobs = JobOrchestrator::spawn(
            data.clone(),
            TrainEngine::new(tracker),
            Arc::clone(&registry),
            OrchestratorConfig::from(&settings),
        );
        let predictions = PredictionService::new(
            Arc::clone(&registry),
            Arc::new(InMemoryPredictionLog::default()),
        );

        Self {
            settings,
            data,
            registry,
            jobs,
            predictions,
            started_at: Utc::now(),
        }
    }
}
