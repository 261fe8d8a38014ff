//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::data::DataStore;
use crate::preprocessing::FeatureInput;
use crate::prediction::LogQuery;
use crate::registry::{ArtifactFilter, RetentionPolicy};
use crate::training::ModelFamily;
use crate::jobs::TrainingRequest;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let active = state.registry.list(&ArtifactFilter {
        family: None,
        is_active: Some(true),
    })?;
    let active_models: serde_json::Map<String, Value> = active
        .iter()
        .map(|a| (a.family.to_string(), json!({ "id": a.id, "name": a.name, "version": a.version })))
        .collect();
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "labeled_records": state.data.count_labeled()?,
        "active_models": active_models,
    })))
}

// ============================================================================
// Training jobs
// ============================================================================

pub async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainingRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let job_id = state.jobs.submit(request)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "job_id": job_id,
            "status": "queued",
            "message": "Training started",
        })),
    ))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let job = state.jobs.status(job_id)?;
    Ok(Json(json!(job)))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Value> {
    let jobs = state.jobs.list();
    Json(json!({
        "jobs": jobs,
        "count": jobs.len(),
    }))
}

pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.jobs.cancel(job_id)?;
    Ok(Json(json!({ "success": true, "job_id": job_id })))
}

pub async fn purge_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let job = state.jobs.purge(job_id)?;
    Ok(Json(json!({ "success": true, "job_id": job.id })))
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModelListQuery {
    model_type: Option<String>,
    is_active: Option<bool>,
}

fn parse_family(raw: Option<&str>) -> Result<Option<ModelFamily>> {
    raw.map(str::parse::<ModelFamily>)
        .transpose()
        .map_err(ServerError::from)
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelListQuery>,
) -> Result<Json<Value>> {
    let filter = ArtifactFilter {
        family: parse_family(query.model_type.as_deref())?,
        is_active: query.is_active,
    };
    let models = state.registry.list(&filter)?;

    Ok(Json(json!({
        "models": models,
        "count": models.len(),
    })))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let model = state.registry.get(model_id)?;
    Ok(Json(json!(model)))
}

pub async fn activate_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let model = state.registry.activate(model_id)?;
    info!(model_id = %model.id, family = %model.family, "Model activated via API");

    Ok(Json(json!({
        "success": true,
        "model": model,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    model_type: Option<String>,
}

pub async fn compare_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<Value>> {
    let family = parse_family(query.model_type.as_deref())?;
    let ranked = state.registry.compare(family)?;
    let comparison: Vec<Value> = ranked
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "name": a.name,
                "model_type": a.family,
                "version": a.version,
                "is_active": a.is_active,
                "metrics": a.metrics,
            })
        })
        .collect();

    Ok(Json(json!({ "comparison": comparison })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetireRequest {
    max_age_days: Option<i64>,
    keep_best: Option<usize>,
    max_deletions: Option<usize>,
}

pub async fn retire_models(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RetireRequest>,
) -> Result<Json<Value>> {
    let mut policy = RetentionPolicy::new(
        request.max_age_days.unwrap_or(state.settings.retention_days),
        request.keep_best.unwrap_or(state.settings.keep_best),
    );
    if let Some(max) = request.max_deletions {
        policy.max_deletions = max;
    }
    if policy.max_age < chrono::Duration::zero() {
        return Err(ServerError::BadRequest("max_age_days must not be negative".to_string()));
    }

    let registry = Arc::clone(&state.registry);
    let report =
        tokio::task::spawn_blocking(move || registry.retire(policy, chrono::Utc::now())).await??;

    Ok(Json(json!(report)))
}

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    inputs: Vec<FeatureInput>,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(model_type): Path<String>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Value>> {
    let family: ModelFamily = model_type.parse()?;

    let worker_state = Arc::clone(&state);
    let predictions = tokio::task::spawn_blocking(move || {
        worker_state
            .predictions
            .predict_active(family, &request.inputs)
    })
    .await??;

    Ok(Json(json!({
        "success": true,
        "predictions": predictions,
        "count": predictions.len(),
    })))
}

pub async fn feature_importance(
    State(state): State<Arc<AppState>>,
    Path(model_type): Path<String>,
) -> Result<Json<Value>> {
    let family: ModelFamily = model_type.parse()?;
    let loaded = state.predictions.active(family)?;
    let importances = state.predictions.feature_importance(&loaded)?;

    Ok(Json(json!({
        "model_id": loaded.artifact.id,
        "feature_importance": importances,
    })))
}

pub async fn prediction_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>> {
    let logs = state.predictions.query_logs(&query)?;

    Ok(Json(json!({
        "logs": logs,
        "count": logs.len(),
    })))
}
