//! Integration test: feature pipeline through training

use mortality_ml::data::sample_records;
use mortality_ml::preprocessing::{mortality_rate, FeaturePipeline, RawRecord, FEATURE_COLUMNS};
use mortality_ml::tracking::{ExperimentTracker, Tracker};
use mortality_ml::training::{ModelFamily, TrainEngine, TrainedModel, TuneLimits};
use mortality_ml::MortalityError;
use std::sync::Arc;

#[test]
fn test_mortality_rate_examples() {
    assert_eq!(mortality_rate(25, 10_000), 250.0);
    assert_eq!(mortality_rate(150, 50_000), 300.0);
}

#[test]
fn test_transform_reproduces_training_matrix() {
    let records = sample_records(400, 1);
    let pipeline = FeaturePipeline::new();
    let fitted = pipeline.fit_transform(&records).unwrap();

    assert_eq!(fitted.features.columns, FEATURE_COLUMNS.map(String::from).to_vec());
    let again = pipeline.transform_raw(&records, &fitted.state).unwrap();
    assert_eq!(again.values, fitted.features.values);
}

#[test]
fn test_incomplete_rows_are_dropped_before_fit() {
    let mut records = sample_records(100, 2);
    records.push(RawRecord {
        county: Some("Cook County".to_string()),
        ..Default::default()
    });
    let fitted = FeaturePipeline::new().fit_transform(&records).unwrap();

    assert_eq!(fitted.report.total, 101);
    assert_eq!(fitted.report.kept, 100);
    assert_eq!(fitted.features.nrows(), 100);
}

#[test]
fn test_both_families_train_and_log_runs() {
    let fitted = FeaturePipeline::new().fit_transform(&sample_records(600, 3)).unwrap();
    let tracker = Arc::new(Tracker::in_memory());
    let engine = TrainEngine::new(tracker.clone());

    for family in ModelFamily::ALL {
        let outcome = engine
            .train(&fitted.features.values, &fitted.labels, family, None, "integration")
            .unwrap();
        assert_eq!(outcome.model.family(), family);
        assert_eq!(outcome.n_train + outcome.n_validation, 600);
        assert!(outcome.metrics.accuracy > 0.5, "{} accuracy {}", family, outcome.metrics.accuracy);
        assert!(outcome.run_ref.is_some());
    }

    let experiment = tracker.experiment("integration").unwrap().unwrap();
    assert_eq!(experiment.runs.len(), 2);
}

#[test]
fn test_tune_is_deterministic() {
    let fitted = FeaturePipeline::new().fit_transform(&sample_records(300, 4)).unwrap();
    let engine = TrainEngine::new(Arc::new(Tracker::in_memory())).with_cv_folds(3);
    let limits = TuneLimits { max_candidates: 6 };

    let first = engine
        .tune(&fitted.features.values, &fitted.labels, ModelFamily::LogisticRegression, limits)
        .unwrap();
    let second = engine
        .tune(&fitted.features.values, &fitted.labels, ModelFamily::LogisticRegression, limits)
        .unwrap();

    assert_eq!(first.best_params, second.best_params);
    assert_eq!(first.best_score, second.best_score);
    assert_eq!(first.evaluated, 6);
}

#[test]
fn test_model_bytes_predict_identically() {
    let fitted = FeaturePipeline::new().fit_transform(&sample_records(300, 5)).unwrap();
    let params = ModelFamily::RandomForest
        .parse_params(Some(&serde_json::from_str(r#"{"n_estimators": 8}"#).unwrap()))
        .unwrap();
    let model = TrainedModel::fit(&params, &fitted.features.values, &fitted.labels).unwrap();

    let restored = TrainedModel::from_bytes(&model.to_bytes().unwrap()).unwrap();
    assert_eq!(
        restored.predict_proba(&fitted.features.values).unwrap(),
        model.predict_proba(&fitted.features.values).unwrap()
    );
}

#[test]
fn test_unsupported_family_parse() {
    let err = "unsupported_model".parse::<ModelFamily>().unwrap_err();
    assert!(matches!(err, MortalityError::UnsupportedModelFamily(_)));
}
