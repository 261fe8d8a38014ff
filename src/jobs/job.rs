//! Training job records and the events that change them

use crate::error::{ErrorKind, MortalityError};
use crate::tracking::RunRef;
use crate::training::{ClassificationMetrics, Hyperparameters, ModelFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type JobId = Uuid;

/// Submission payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// `random_forest` or `logistic_regression`
    pub model_type: String,
    #[serde(default)]
    pub hyperparameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub experiment_name: Option<String>,
    /// Grid-search first and train with the winning parameters
    #[serde(default)]
    pub tune: bool,
}

impl TrainingRequest {
    pub fn new(model_type: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&MortalityError> for JobError {
    fn from(err: &MortalityError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub model_id: Uuid,
    pub model_name: String,
    pub metrics: ClassificationMetrics,
    pub run_ref: Option<RunRef>,
    pub n_training_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_params: Option<Hyperparameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub id: JobId,
    pub family: ModelFamily,
    pub hyperparameters: Option<Hyperparameters>,
    pub experiment: String,
    pub tune: bool,
    pub state: JobState,
    /// Percent complete, never decreases
    pub progress: u8,
    pub stage: String,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

impl TrainingJob {
    pub(crate) fn queued(
        family: ModelFamily,
        hyperparameters: Option<Hyperparameters>,
        experiment: String,
        tune: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            family,
            hyperparameters,
            experiment,
            tune,
            state: JobState::Queued,
            progress: 0,
            stage: "queued".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            cancel_requested: false,
        }
    }

    /// Apply one event. Returns false when the job was already terminal and
    /// the event was dropped.
    pub fn apply(&mut self, event: &JobEvent) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        match &event.kind {
            JobEventKind::Started => {
                self.state = JobState::Running;
                self.started_at = Some(event.at);
            }
            JobEventKind::Progress { progress, stage } => {
                self.state = JobState::Running;
                self.progress = self.progress.max(*progress);
                self.stage = stage.clone();
            }
            JobEventKind::CancelRequested => {
                self.cancel_requested = true;
            }
            JobEventKind::Succeeded(result) => {
                self.state = JobState::Succeeded;
                self.progress = 100;
                self.stage = "completed".to_string();
                self.result = Some(result.clone());
                self.finished_at = Some(event.at);
            }
            JobEventKind::Failed(error) => {
                self.state = JobState::Failed;
                self.stage = "failed".to_string();
                self.error = Some(error.clone());
                self.finished_at = Some(event.at);
            }
        }
        true
    }
}

/// A change to one job, applied by the orchestrator's recorder
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job_id: JobId,
    pub at: DateTime<Utc>,
    pub kind: JobEventKind,
}

#[derive(Debug, Clone)]
pub enum JobEventKind {
    Started,
    Progress { progress: u8, stage: String },
    CancelRequested,
    Succeeded(JobResult),
    Failed(JobError),
}

impl JobEvent {
    pub fn new(job_id: JobId, kind: JobEventKind) -> Self {
        Self {
            job_id,
            at: Utc::now(),
            kind,
        }
    }

    pub fn progress(job_id: JobId, progress: u8, stage: &str) -> Self {
        Self::new(
            job_id,
            JobEventKind::Progress {
                progress,
                stage: stage.to_string(),
            },
        )
    }
}
