//! Training job orchestration

mod job;
mod orchestrator;

pub use job::{
    JobError, JobEvent, JobEventKind, JobId, JobResult, JobState, TrainingJob, TrainingRequest,
};
pub use orchestrator::{JobOrchestrator, OrchestratorConfig};
