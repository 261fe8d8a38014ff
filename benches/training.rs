use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mortality_ml::data::sample_records;
use mortality_ml::preprocessing::{FeatureInput, FeaturePipeline};
use mortality_ml::training::{ModelFamily, TrainedModel};

fn bench_feature_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    for n_rows in [1000, 10000].iter() {
        let records = sample_records(*n_rows, 7);
        group.bench_with_input(BenchmarkId::new("fit_transform", n_rows), &records, |b, records| {
            b.iter(|| FeaturePipeline::new().fit_transform(black_box(records)).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let fitted = FeaturePipeline::new().fit_transform(&sample_records(*n_rows, 7)).unwrap();

        for family in ModelFamily::ALL {
            let params = family.default_params();
            group.bench_with_input(
                BenchmarkId::new(family.as_str(), n_rows),
                &fitted,
                |b, fitted| {
                    b.iter(|| {
                        TrainedModel::fit(&params, black_box(&fitted.features.values), &fitted.labels).unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let pipeline = FeaturePipeline::new();
    let fitted = pipeline.fit_transform(&sample_records(5000, 7)).unwrap();
    let model = TrainedModel::fit(
        &ModelFamily::RandomForest.default_params(),
        &fitted.features.values,
        &fitted.labels,
    )
    .unwrap();

    for n_rows in [1, 100, 1000].iter() {
        let inputs: Vec<FeatureInput> = pipeline
            .validate(&sample_records(*n_rows, 11))
            .unwrap()
            .0
            .iter()
            .map(|r| r.feature_input())
            .collect();

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &inputs, |b, inputs| {
            b.iter(|| {
                let x = pipeline.transform(black_box(inputs), &fitted.state).unwrap();
                model.predict_proba(&x.values).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_feature_pipeline, bench_training, bench_prediction);
criterion_main!(benches);
