//! Integration test: file-backed registry lifecycle

use mortality_ml::data::sample_records;
use mortality_ml::preprocessing::FeaturePipeline;
use mortality_ml::registry::{
    ActiveModel, ArtifactFilter, FsArtifactStore, LocalMetadataStore, ModelRegistry, NewArtifact,
    RetentionPolicy,
};
use mortality_ml::training::{ClassificationMetrics, ModelFamily, TrainedModel};
use mortality_ml::MortalityError;
use std::path::Path;
use std::sync::{Arc, Barrier};

fn open_registry(dir: &Path) -> ModelRegistry {
    ModelRegistry::new(
        Arc::new(FsArtifactStore::open(dir).unwrap()),
        Arc::new(LocalMetadataStore::open(dir).unwrap()),
    )
}

fn save(registry: &ModelRegistry, name: &str, f1: f64) -> uuid::Uuid {
    let fitted = FeaturePipeline::new().fit_transform(&sample_records(120, 9)).unwrap();
    let params = ModelFamily::LogisticRegression.default_params();
    let model = TrainedModel::fit(&params, &fitted.features.values, &fitted.labels).unwrap();
    registry
        .save_and_activate(
            &model,
            NewArtifact {
                name: name.to_string(),
                metrics: ClassificationMetrics {
                    f1_score: f1,
                    ..Default::default()
                },
                hyperparameters: params,
                run_ref: None,
                n_training_records: fitted.report.kept,
            },
            &fitted.state,
        )
        .unwrap()
        .id
}

#[test]
fn test_active_model_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let registry = open_registry(dir.path());
        save(&registry, "lr_a", 0.6);
        save(&registry, "lr_b", 0.7)
    };

    let registry = open_registry(dir.path());
    match registry.load_active(ModelFamily::LogisticRegression).unwrap() {
        ActiveModel::Loaded(loaded) => assert_eq!(loaded.artifact.id, id),
        other => panic!("expected a loaded model, got {:?}", other),
    }
    assert!(dir.path().join("models/lr_b.bin").exists());
    assert!(dir.path().join("models/lr_b.pipeline.bin").exists());
}

#[test]
fn test_missing_blob_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(dir.path());
    let id = save(&registry, "lr_gone", 0.5);
    std::fs::remove_file(dir.path().join("models/lr_gone.pipeline.bin")).unwrap();

    match registry.load_active(ModelFamily::LogisticRegression).unwrap() {
        ActiveModel::MissingBinary { artifact_id, key } => {
            assert_eq!(artifact_id, id);
            assert_eq!(key, "models/lr_gone.pipeline.bin");
        }
        other => panic!("expected missing binary, got {:?}", other),
    }
}

#[test]
fn test_concurrent_tickets_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(open_registry(dir.path()));
    let a = save(&registry, "lr_1", 0.5);
    let b = save(&registry, "lr_2", 0.5);

    let ticket_a = registry.prepare_activation(a).unwrap();
    let ticket_b = registry.prepare_activation(b).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [ticket_a, ticket_b]
        .into_iter()
        .map(|ticket| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                registry.commit_activation(ticket)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, MortalityError::ActivationConflict(_))));

    let active = registry
        .list(&ArtifactFilter {
            family: Some(ModelFamily::LogisticRegression),
            is_active: Some(true),
        })
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[test]
fn test_retire_never_touches_active_or_best() {
    let dir = tempfile::tempdir().unwrap();
    let registry = open_registry(dir.path());
    for (i, f1) in [0.4, 0.9, 0.6, 0.8, 0.5].iter().enumerate() {
        save(&registry, &format!("lr_{}", i), *f1);
    }
    let active_before = registry
        .list(&ArtifactFilter {
            family: None,
            is_active: Some(true),
        })
        .unwrap();

    let later = chrono::Utc::now() + chrono::Duration::days(45);
    let report = registry.retire(RetentionPolicy::new(30, 2), later).unwrap();

    assert_eq!(report.deleted.len(), 2);
    let remaining = registry.list(&ArtifactFilter::default()).unwrap();
    assert_eq!(remaining.len(), 3);
    assert!(remaining.iter().any(|m| m.id == active_before[0].id && m.is_active));
    let names: Vec<&str> = remaining.iter().map(|m| m.name.as_str()).collect();
    assert!(names.contains(&"lr_1"));
    assert!(names.contains(&"lr_3"));
    assert!(!dir.path().join("models/lr_0.bin").exists());
}
