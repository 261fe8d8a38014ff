//! Integration test: REST API endpoints

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mortality_ml::config::Settings;
use mortality_ml::data::sample_records;
use mortality_ml::preprocessing::RawRecord;
use mortality_ml::server::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state(records: usize) -> Arc<AppState> {
    let settings = Settings {
        workers: 1,
        ..Settings::default()
    };
    let state = AppState::in_memory(settings);
    state.data.extend(sample_records(records, 21));
    Arc::new(state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn wait_for_job(app: &axum::Router, job_id: &str) -> Value {
    for _ in 0..1200 {
        let (status, job) = send(app, "GET", &format!("/api/jobs/{}", job_id), None).await;
        assert_eq!(status, StatusCode::OK);
        if job["state"] == "succeeded" || job["state"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {} did not finish", job_id);
}

async fn train_small_forest(app: &axum::Router) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/train",
        Some(json!({
            "model_type": "random_forest",
            "hyperparameters": {"n_estimators": 5, "max_depth": 6}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let job = wait_for_job(app, &job_id).await;
    assert_eq!(job["state"], "succeeded", "{}", job);
    job
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_router(test_state(0));
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_counts_only_labeled_rows() {
    let state = test_state(3);
    state.data.extend(vec![RawRecord {
        county: Some("Cook County".to_string()),
        ..Default::default()
    }]);
    let app = create_router(state);

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labeled_records"], 3);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = create_router(test_state(0));
    let (status, body) = send(&app, "GET", "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_train_rejects_unsupported_family() {
    let app = create_router(test_state(1200));
    let (status, body) = send(
        &app,
        "POST",
        "/api/train",
        Some(json!({"model_type": "unsupported_model"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unsupported_model"));

    let (_, jobs) = send(&app, "GET", "/api/jobs", None).await;
    assert_eq!(jobs["count"], 0);
}

#[tokio::test]
async fn test_train_rejects_insufficient_data() {
    let app = create_router(test_state(999));
    let (status, _) = send(
        &app,
        "POST",
        "/api/train",
        Some(json!({"model_type": "random_forest"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, jobs) = send(&app, "GET", "/api/jobs", None).await;
    assert_eq!(jobs["count"], 0);
}

#[tokio::test]
async fn test_train_rejects_bad_hyperparameters() {
    let app = create_router(test_state(1200));
    let (status, _) = send(
        &app,
        "POST",
        "/api/train",
        Some(json!({"model_type": "logistic_regression", "hyperparameters": {"C": "big"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_and_model_are_404() {
    let app = create_router(test_state(0));
    let id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/api/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", &format!("/api/models/{}/activate", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predict_without_active_model_is_404() {
    let app = create_router(test_state(0));
    let (status, _) = send(
        &app,
        "POST",
        "/api/predict/logistic_regression",
        Some(json!({"inputs": []})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_train_then_predict_flow() {
    let app = create_router(test_state(1200));
    let job = train_small_forest(&app).await;
    assert_eq!(job["progress"], 100);
    let model_id = job["result"]["model_id"].as_str().unwrap().to_string();

    let (status, models) = send(&app, "GET", "/api/models?model_type=random_forest&is_active=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(models["count"], 1);
    assert_eq!(models["models"][0]["id"], model_id.as_str());

    let input = json!({
        "county": "Kings County",
        "ten_year_age_groups": "75-84 years",
        "gender": "Male",
        "year": 2015,
        "population": 250000,
        "state": "New York"
    });
    let (status, predicted) = send(
        &app,
        "POST",
        "/api/predict/random_forest",
        Some(json!({"inputs": [input.clone(), input]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", predicted);
    assert_eq!(predicted["count"], 2);
    let p = predicted["predictions"][0]["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));

    let (status, logs) = send(&app, "GET", "/api/predictions/logs?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["count"], 2);

    let (status, _) = send(&app, "GET", "/api/predictions/logs?limit=5000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, importance) = send(&app, "GET", "/api/predict/random_forest/importance", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(importance["feature_importance"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_unknown_category_is_400() {
    let app = create_router(test_state(1200));
    train_small_forest(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/predict/random_forest",
        Some(json!({"inputs": [{
            "county": "Atlantis",
            "ten_year_age_groups": "75-84 years",
            "gender": "Male",
            "year": 2015,
            "population": 250000,
            "state": "New York"
        }]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Atlantis"));
}

#[tokio::test]
async fn test_activate_switches_active_model() {
    let app = create_router(test_state(1200));
    let first = train_small_forest(&app).await;
    let second = train_small_forest(&app).await;
    let first_id = first["result"]["model_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "PUT", &format!("/api/models/{}/activate", first_id), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, active) = send(&app, "GET", "/api/models?is_active=true", None).await;
    assert_eq!(active["count"], 1);
    assert_eq!(active["models"][0]["id"], first_id.as_str());
    assert_ne!(second["result"]["model_id"], first["result"]["model_id"]);

    let (status, compared) = send(&app, "GET", "/api/models/compare", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(compared["comparison"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_retire_keeps_recent_models() {
    let app = create_router(test_state(1200));
    train_small_forest(&app).await;

    let (status, report) = send(&app, "POST", "/api/models/retire", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["candidates"], 0);
    assert_eq!(report["deleted"].as_array().unwrap().len(), 0);
}
