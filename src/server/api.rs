//! API route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit /api/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed. Check the API documentation for supported methods.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // System
        .route("/health", get(handlers::health_check))
        // Training
        .route("/train", post(handlers::start_training))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:job_id", get(handlers::get_job).delete(handlers::purge_job))
        .route("/jobs/:job_id/cancel", post(handlers::cancel_job))
        // Models
        .route("/models", get(handlers::list_models))
        .route("/models/compare", get(handlers::compare_models))
        .route("/models/retire", post(handlers::retire_models))
        .route("/models/:model_id", get(handlers::get_model))
        .route("/models/:model_id/activate", put(handlers::activate_model))
        // Inference
        .route("/predict/:model_type", post(handlers::predict))
        .route("/predict/:model_type/importance", get(handlers::feature_importance))
        .route("/predictions/logs", get(handlers::prediction_logs))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    Router::new()
        .nest("/api", api_routes)
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
