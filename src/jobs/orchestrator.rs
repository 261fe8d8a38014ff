//! Asynchronous training jobs
//!
//! `submit` validates a request, records a queued job and hands it to a pool
//! of tokio workers. Workers run the CPU-bound stages on the blocking pool and
//! report each checkpoint as a `JobEvent`; a single recorder task applies the
//! events to the job table.

use super::job::{JobError, JobEvent, JobEventKind, JobId, JobResult, TrainingJob, TrainingRequest};
use crate::config::Settings;
use crate::data::DataStore;
use crate::error::{ErrorKind, MortalityError, Result};
use crate::preprocessing::FeaturePipeline;
use crate::registry::{ModelRegistry, NewArtifact};
use crate::training::{Hyperparameters, ModelFamily, TrainEngine, TuneLimits};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Orchestrator limits and defaults
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub min_training_records: usize,
    pub max_training_records: usize,
    pub default_experiment: String,
    pub tune_limits: TuneLimits,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for OrchestratorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            workers: settings.workers.max(1),
            min_training_records: settings.min_training_records,
            max_training_records: settings.max_training_records,
            default_experiment: settings.experiment_name.clone(),
            tune_limits: TuneLimits::default(),
        }
    }
}

/// Work item handed to the pool
struct QueuedJob {
    id: JobId,
    family: ModelFamily,
    hyperparameters: Option<Hyperparameters>,
    experiment: String,
    tune: bool,
    cancel: Arc<AtomicBool>,
}

/// Everything a worker needs to run one job
struct JobContext {
    data: Arc<dyn DataStore>,
    engine: TrainEngine,
    registry: Arc<ModelRegistry>,
    pipeline: FeaturePipeline,
    config: OrchestratorConfig,
}

type JobTable = Arc<RwLock<HashMap<JobId, TrainingJob>>>;

pub struct JobOrchestrator {
    context: Arc<JobContext>,
    jobs: JobTable,
    cancel_flags: Arc<RwLock<HashMap<JobId, Arc<AtomicBool>>>>,
    queue: mpsc::UnboundedSender<QueuedJob>,
    events: mpsc::UnboundedSender<JobEvent>,
}

impl JobOrchestrator {
    /// Start the worker pool and the event recorder.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(
        data: Arc<dyn DataStore>,
        engine: TrainEngine,
        registry: Arc<ModelRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<QueuedJob>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<JobEvent>();

        tokio::spawn(record_events(Arc::clone(&jobs), event_rx));

        let context = Arc::new(JobContext {
            data,
            engine,
            registry,
            pipeline: FeaturePipeline::new(),
            config,
        });

        let queue_rx = Arc::new(Mutex::new(queue_rx));
        for worker_id in 0..context.config.workers {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&context),
                Arc::clone(&queue_rx),
                event_tx.clone(),
            ));
        }

        info!(workers = context.config.workers, "Job orchestrator started");

        Self {
            context,
            jobs,
            cancel_flags: Arc::new(RwLock::new(HashMap::new())),
            queue: queue_tx,
            events: event_tx,
        }
    }

    /// Validate and enqueue a training request.
    ///
    /// Rejections create no job record.
    pub fn submit(&self, request: TrainingRequest) -> Result<JobId> {
        let family: ModelFamily = request.model_type.parse()?;
        let hyperparameters = match &request.hyperparameters {
            Some(overrides) => Some(family.parse_params(Some(overrides))?),
            None => None,
        };

        let available = self.context.data.count_labeled()?;
        if available < self.context.config.min_training_records {
            return Err(MortalityError::Validation(format!(
                "insufficient training data: {} labeled records, need at least {}",
                available, self.context.config.min_training_records
            )));
        }

        let experiment = request
            .experiment_name
            .unwrap_or_else(|| self.context.config.default_experiment.clone());
        let job = TrainingJob::queued(family, hyperparameters.clone(), experiment.clone(), request.tune);
        let id = job.id;
        let cancel = Arc::new(AtomicBool::new(false));

        self.jobs.write().insert(id, job);
        self.cancel_flags.write().insert(id, Arc::clone(&cancel));

        let queued = QueuedJob {
            id,
            family,
            hyperparameters,
            experiment,
            tune: request.tune,
            cancel,
        };
        if self.queue.send(queued).is_err() {
            self.jobs.write().remove(&id);
            self.cancel_flags.write().remove(&id);
            return Err(MortalityError::Training("job queue is closed".to_string()));
        }

        info!(job_id = %id, family = %family, tune = request.tune, "Training job queued");
        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Result<TrainingJob> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| MortalityError::NotFound(format!("job {}", id)))
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<TrainingJob> {
        let mut jobs: Vec<TrainingJob> = self.jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Remove a finished job from the table
    pub fn purge(&self, id: JobId) -> Result<TrainingJob> {
        let mut jobs = self.jobs.write();
        let state = jobs
            .get(&id)
            .map(|j| j.state)
            .ok_or_else(|| MortalityError::NotFound(format!("job {}", id)))?;
        if !state.is_terminal() {
            return Err(MortalityError::Validation(format!(
                "job {} is still {:?}; only finished jobs can be purged",
                id, state
            )));
        }
        self.cancel_flags.write().remove(&id);
        jobs.remove(&id)
            .ok_or_else(|| MortalityError::NotFound(format!("job {}", id)))
    }

    /// Ask a job to stop at its next checkpoint.
    ///
    /// A job that has started saving its model is past the last checkpoint
    /// and still succeeds.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let state = self.status(id)?.state;
        if state.is_terminal() {
            return Err(MortalityError::Validation(format!("job {} has already finished", id)));
        }
        if let Some(flag) = self.cancel_flags.read().get(&id) {
            flag.store(true, Ordering::SeqCst);
        }
        let _ = self.events.send(JobEvent::new(id, JobEventKind::CancelRequested));
        info!(job_id = %id, "Cancellation requested");
        Ok(())
    }

    /// Poll until the job is terminal or `timeout` elapses
    pub async fn wait(&self, id: JobId, timeout: Duration) -> Result<TrainingJob> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.status(id)?;
            if job.state.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

async fn record_events(jobs: JobTable, mut events: mpsc::UnboundedReceiver<JobEvent>) {
    while let Some(event) = events.recv().await {
        let mut table = jobs.write();
        match table.get_mut(&event.job_id) {
            Some(job) => {
                if !job.apply(&event) {
                    debug!(job_id = %event.job_id, "Dropped event for finished job");
                }
            }
            None => debug!(job_id = %event.job_id, "Dropped event for purged job"),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    context: Arc<JobContext>,
    queue: Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    events: mpsc::UnboundedSender<JobEvent>,
) {
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(job) = next else {
            debug!(worker_id, "Job queue closed, worker exiting");
            break;
        };

        let id = job.id;
        let family = job.family;
        info!(worker_id, job_id = %id, family = %family, "Training job started");

        let ctx = Arc::clone(&context);
        let tx = events.clone();
        let outcome = tokio::task::spawn_blocking(move || run_job(&ctx, &job, &tx)).await;

        let terminal = match outcome {
            Ok(Ok(result)) => {
                info!(
                    job_id = %id,
                    model_id = %result.model_id,
                    f1 = result.metrics.f1_score,
                    "Training job succeeded"
                );
                JobEventKind::Succeeded(result)
            }
            Ok(Err(e)) => {
                warn!(job_id = %id, error = %e, "Training job failed");
                JobEventKind::Failed(JobError::from(&e))
            }
            Err(join_err) => {
                error!(job_id = %id, error = %join_err, "Training job panicked");
                JobEventKind::Failed(JobError {
                    kind: ErrorKind::Internal,
                    message: join_err.to_string(),
                })
            }
        };
        let _ = events.send(JobEvent::new(id, terminal));
    }
}

/// Reports checkpoints and stops the job once cancellation is requested
struct Checkpoints<'a> {
    job: &'a QueuedJob,
    events: &'a mpsc::UnboundedSender<JobEvent>,
}

impl Checkpoints<'_> {
    fn check_cancelled(&self) -> Result<()> {
        if self.job.cancel.load(Ordering::SeqCst) {
            return Err(MortalityError::Cancelled);
        }
        Ok(())
    }

    fn reach(&self, progress: u8, stage: &str) -> Result<()> {
        self.check_cancelled()?;
        self.report(progress, stage);
        Ok(())
    }

    /// Progress past the commit point, where cancellation no longer applies
    fn report(&self, progress: u8, stage: &str) {
        let _ = self.events.send(JobEvent::progress(self.job.id, progress, stage));
    }
}

fn run_job(ctx: &JobContext, job: &QueuedJob, events: &mpsc::UnboundedSender<JobEvent>) -> Result<JobResult> {
    let checkpoints = Checkpoints { job, events };
    checkpoints.check_cancelled()?;
    let _ = events.send(JobEvent::new(job.id, JobEventKind::Started));
    checkpoints.reach(5, "started")?;

    let records = ctx.data.load_labeled(ctx.config.max_training_records)?;
    if records.len() < ctx.config.min_training_records {
        return Err(MortalityError::Validation(format!(
            "insufficient training data: {} labeled records, need at least {}",
            records.len(),
            ctx.config.min_training_records
        )));
    }
    checkpoints.reach(20, "data loaded")?;

    let fitted = ctx.pipeline.fit_transform(&records)?;
    checkpoints.reach(40, "features engineered")?;

    let (params, tuning) = if job.tune {
        let tuning = ctx.engine.tune(
            &fitted.features.values,
            &fitted.labels,
            job.family,
            ctx.config.tune_limits,
        )?;
        checkpoints.reach(55, "hyperparameters tuned")?;
        (Some(tuning.best_params.clone()), Some(tuning))
    } else {
        (job.hyperparameters.clone(), None)
    };

    let outcome = ctx.engine.train(
        &fitted.features.values,
        &fitted.labels,
        job.family,
        params,
        &job.experiment,
    )?;
    checkpoints.reach(75, "model trained")?;

    let mut name = NewArtifact::default_name(job.family, Utc::now());
    if ctx.registry.name_taken(&name)? {
        name = format!("{}_{}", name, &job.id.simple().to_string()[..8]);
    }
    let new_artifact = NewArtifact {
        name,
        metrics: outcome.metrics,
        hyperparameters: outcome.params.clone(),
        run_ref: outcome.run_ref.clone(),
        n_training_records: fitted.report.kept,
    };
    // Saving is the commit point: once the model is active the job succeeds
    checkpoints.check_cancelled()?;
    let artifact = ctx
        .registry
        .save_and_activate(&outcome.model, new_artifact, &fitted.state)?;
    checkpoints.report(90, "model saved");

    Ok(JobResult {
        model_id: artifact.id,
        model_name: artifact.name,
        metrics: outcome.metrics,
        run_ref: outcome.run_ref,
        n_training_records: fitted.report.kept,
        best_params: tuning.as_ref().map(|t| t.best_params.clone()),
        best_score: tuning.map(|t| t.best_score),
    })
}
