//! Command-line interface
//!
//! Serve the REST API, run training jobs in-process, and manage the model
//! registry from a terminal.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Settings;
use crate::data::{load_csv, sample_records};
use crate::jobs::{JobState, TrainingRequest};
use crate::preprocessing::{FeaturePipeline, RawRecord};
use crate::registry::{ArtifactFilter, ModelArtifact, RetentionPolicy};
use crate::server::{run_server, AppState};
use crate::tracking::Tracker;
use crate::training::{ModelFamily, TrainEngine};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mortality-ml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, register and serve respiratory mortality classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where models and experiment runs live
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Model registry directory
    #[arg(long, env = "MODEL_REGISTRY_URI")]
    pub models_dir: Option<PathBuf>,

    /// Experiment tracking directory
    #[arg(long, env = "TRACKING_DIR")]
    pub tracking_dir: Option<PathBuf>,
}

/// Training rows: a CSV export or a generated sample
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Mortality CSV to load
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Generate this many sample rows instead of reading a CSV
    #[arg(long, conflicts_with = "data")]
    pub sample: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST server
    Serve {
        #[arg(short, long, env = "API_PORT")]
        port: Option<u16>,

        #[arg(long, env = "API_HOST")]
        host: Option<String>,

        /// Training worker pool size
        #[arg(long, env = "TRAINING_WORKERS")]
        workers: Option<usize>,

        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Train a model, register it and make it active
    Train {
        #[command(flatten)]
        data: DataArgs,

        /// random_forest or logistic_regression
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Hyperparameter overrides as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Grid-search before training
        #[arg(long)]
        tune: bool,

        #[arg(long)]
        experiment: Option<String>,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Train every model family with defaults and compare validation metrics
    Benchmark {
        #[command(flatten)]
        data: DataArgs,
    },

    /// List registered models
    Models {
        /// Only this model type
        #[arg(short, long)]
        model: Option<String>,

        /// Only active models
        #[arg(long)]
        active: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Make a registered model the active one of its type
    Activate {
        id: Uuid,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Delete old inactive models, keeping the best per type
    Retire {
        #[arg(long, env = "RETENTION_DAYS")]
        max_age_days: Option<i64>,

        #[arg(long, env = "KEEP_BEST")]
        keep_best: Option<usize>,

        #[arg(long, default_value = "1000")]
        max_deletions: usize,

        #[command(flatten)]
        store: StoreArgs,
    },
}

fn settings_with(store: &StoreArgs) -> Settings {
    let mut settings = Settings::default();
    if let Some(dir) = &store.models_dir {
        settings.models_dir = dir.clone();
    }
    if let Some(dir) = &store.tracking_dir {
        settings.tracking_dir = dir.clone();
    }
    settings
}

fn load_records(data: &DataArgs) -> anyhow::Result<Vec<RawRecord>> {
    match (&data.data, data.sample) {
        (Some(path), _) => Ok(load_csv(path)?),
        (None, Some(n)) => Ok(sample_records(n, 42)),
        (None, None) => anyhow::bail!("pass --data <csv> or --sample <rows>"),
    }
}

fn print_model_row(model: &ModelArtifact) {
    let marker = if model.is_active { ok("●") } else { dim("○") };
    println!(
        "  {} {:<40} {:<20} {:>7} {:>8.4} {}",
        marker,
        model.name,
        model.family.to_string(),
        model.version.to_string(),
        model.metrics.f1_score,
        dim(&model.id.to_string()),
    );
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    workers: Option<usize>,
    data: &DataArgs,
    store: &StoreArgs,
) -> anyhow::Result<()> {
    let mut settings = settings_with(store);
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(workers) = workers {
        settings.workers = workers.max(1);
    }

    let state = AppState::open(settings)?;
    if data.data.is_some() || data.sample.is_some() {
        let records = load_records(data)?;
        state.data.extend(records);
    }

    run_server(Arc::new(state)).await
}

pub async fn cmd_train(
    data: &DataArgs,
    model: &str,
    params: Option<&str>,
    tune: bool,
    experiment: Option<String>,
    store: &StoreArgs,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let records = load_records(data)?;
    step_done(&format!("{} rows in {:?}", records.len(), start.elapsed()));

    let hyperparameters = params.map(serde_json::from_str).transpose()?;
    let state = AppState::open(settings_with(store))?;
    state.data.extend(records);

    let job_id = state.jobs.submit(TrainingRequest {
        model_type: model.to_string(),
        hyperparameters,
        experiment_name: experiment,
        tune,
    })?;
    println!("  {} job {}", accent("›"), dim(&job_id.to_string()));

    let mut last_stage = String::new();
    let job = loop {
        let job = state.jobs.status(job_id)?;
        if job.stage != last_stage {
            println!("  {:>4}% {}", job.progress, muted(&job.stage));
            last_stage = job.stage.clone();
        }
        if job.state.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    match (job.state, job.result, job.error) {
        (JobState::Succeeded, Some(result), _) => {
            println!();
            println!("  {:<16} {}", muted("Model"), result.model_name.white().bold());
            println!("  {:<16} {}", muted("Records"), result.n_training_records);
            println!("  {:<16} {:.4}", muted("Accuracy"), result.metrics.accuracy);
            println!("  {:<16} {:.4}", muted("F1"), result.metrics.f1_score);
            println!("  {:<16} {:.4}", muted("AUC"), result.metrics.auc);
            if let Some(score) = result.best_score {
                println!("  {:<16} {:.4}", muted("Best CV F1"), score);
            }
            println!();
            Ok(())
        }
        (_, _, Some(error)) => anyhow::bail!("training failed ({:?}): {}", error.kind, error.message),
        (state, _, _) => anyhow::bail!("training ended in state {:?}", state),
    }
}

pub fn cmd_benchmark(data: &DataArgs) -> anyhow::Result<()> {
    section("Benchmark");

    step_run("Engineering features");
    let records = load_records(data)?;
    let fitted = FeaturePipeline::new().fit_transform(&records)?;
    step_done(&format!(
        "{} rows kept, {} dropped",
        fitted.report.kept,
        fitted.report.dropped()
    ));

    let engine = TrainEngine::new(Arc::new(Tracker::in_memory()));

    println!();
    println!(
        "  {:<24} {:>10} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted("Accuracy"),
        muted("F1"),
        muted("AUC"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(68)));

    let mut best: Option<(ModelFamily, f64)> = None;
    for family in ModelFamily::ALL {
        let start = Instant::now();
        match engine.train(&fitted.features.values, &fitted.labels, family, None, "benchmark") {
            Ok(outcome) => {
                let m = outcome.metrics;
                println!(
                    "  {:<24} {:>10.4} {:>10.4} {:>10.4} {:>10.2?}",
                    family.to_string(),
                    m.accuracy,
                    m.f1_score,
                    m.auc,
                    start.elapsed()
                );
                if best.map_or(true, |(_, f1)| m.f1_score > f1) {
                    best = Some((family, m.f1_score));
                }
            }
            Err(e) => {
                println!("  {:<24} {:>10}", family.to_string(), format!("err: {}", e).red());
            }
        }
    }

    println!("  {}", dim(&"─".repeat(68)));
    if let Some((family, f1)) = best {
        println!();
        println!("  {} {} {} {:.4}", ok("best"), family.to_string().white().bold(), muted("F1:"), f1);
    }
    println!();
    Ok(())
}

pub async fn cmd_models(model: Option<&str>, active: bool, store: &StoreArgs) -> anyhow::Result<()> {
    let state = AppState::open(settings_with(store))?;
    let filter = ArtifactFilter {
        family: model.map(str::parse::<ModelFamily>).transpose()?,
        is_active: active.then_some(true),
    };
    let models = state.registry.list(&filter)?;

    section("Models");
    if models.is_empty() {
        println!("  {}", dim("no models registered"));
    }
    for m in &models {
        print_model_row(m);
    }
    println!();
    Ok(())
}

pub async fn cmd_activate(id: Uuid, store: &StoreArgs) -> anyhow::Result<()> {
    let state = AppState::open(settings_with(store))?;
    let model = state.registry.activate(id)?;

    section("Activate");
    print_model_row(&model);
    println!();
    Ok(())
}

pub async fn cmd_retire(
    max_age_days: Option<i64>,
    keep_best: Option<usize>,
    max_deletions: usize,
    store: &StoreArgs,
) -> anyhow::Result<()> {
    let settings = settings_with(store);
    let mut policy = RetentionPolicy::new(
        max_age_days.unwrap_or(settings.retention_days),
        keep_best.unwrap_or(settings.keep_best),
    );
    policy.max_deletions = max_deletions;

    let state = AppState::open(settings)?;
    let report = state.registry.retire(policy, chrono::Utc::now())?;

    section("Retire");
    println!("  {:<16} {}", muted("Candidates"), report.candidates);
    println!("  {:<16} {}", muted("Kept"), report.kept);
    println!("  {:<16} {}", muted("Deleted"), report.deleted.len());
    if report.truncated {
        println!("  {}", "deletion limit reached; run again to continue".yellow());
    }
    println!();
    Ok(())
}
