//! Fit/transform feature pipeline
//!
//! `fit_transform` learns every statistic the model input depends on and
//! returns it as an explicit [`PipelineState`]; `transform` only ever reads
//! a state, so the same state always yields the same matrix.

use super::encoder::LabelEncoder;
use super::quantile::{median, quantile, QuantileBuckets};
use super::record::{
    EngineeredRecord, FeatureInput, MortalityCategory, MortalityRecord, PopulationDensity,
    RawRecord, EAST_COAST_STATES, WEST_COAST_STATES,
};
use super::scaler::StandardScaler;
use crate::error::{MortalityError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Model input columns, in matrix order
pub const FEATURE_COLUMNS: [&str; 6] = [
    "county",
    "ten_year_age_groups",
    "gender",
    "year",
    "population",
    "state",
];

/// Label-encoded feature columns
pub const CATEGORICAL_FEATURES: [&str; 4] = ["county", "ten_year_age_groups", "gender", "state"];

/// Standard-scaled feature columns
pub const NUMERIC_FEATURES: [&str; 2] = ["year", "population"];

const MORTALITY_BUCKETS: usize = 5;
const DENSITY_BUCKETS: usize = 3;
const HIGH_MORTALITY_QUANTILE: f64 = 0.75;

/// Numeric matrix plus the column names it was built with
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub values: Array2<f64>,
    pub columns: Vec<String>,
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Row accounting from the validation step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub total: usize,
    pub kept: usize,
    /// Rows with a null in a required field
    pub dropped_missing: usize,
    /// Rows with negative deaths or non-positive population
    pub dropped_invalid: usize,
}

impl ValidationReport {
    pub fn dropped(&self) -> usize {
        self.dropped_missing + self.dropped_invalid
    }
}

/// Everything learned at fit time.
///
/// Persisted next to each model artifact; prediction-time transforms must
/// use the state the model was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    feature_columns: Vec<String>,
    encoders: Vec<LabelEncoder>,
    scaler: StandardScaler,
    high_mortality_threshold: f64,
    mortality_buckets: QuantileBuckets,
    density_buckets: QuantileBuckets,
    fitted_rows: usize,
}

impl PipelineState {
    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn encoder(&self, field: &str) -> Option<&LabelEncoder> {
        self.encoders.iter().find(|e| e.field() == field)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Fit-time 75th percentile of `mortality_rate`
    pub fn high_mortality_threshold(&self) -> f64 {
        self.high_mortality_threshold
    }

    pub fn mortality_edges(&self) -> &[f64] {
        self.mortality_buckets.edges()
    }

    pub fn density_edges(&self) -> &[f64] {
        self.density_buckets.edges()
    }

    pub fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn check_columns(&self) -> Result<()> {
        let matches = self.feature_columns.len() == FEATURE_COLUMNS.len()
            && self
                .feature_columns
                .iter()
                .zip(FEATURE_COLUMNS.iter())
                .all(|(a, b)| a == b);
        if !matches {
            return Err(MortalityError::Validation(format!(
                "pipeline state column order {:?} does not match {:?}",
                self.feature_columns, FEATURE_COLUMNS
            )));
        }
        if self.encoders.len() != CATEGORICAL_FEATURES.len() {
            return Err(MortalityError::Validation(format!(
                "pipeline state has {} encoders, expected {}",
                self.encoders.len(),
                CATEGORICAL_FEATURES.len()
            )));
        }
        Ok(())
    }
}

/// Output of [`FeaturePipeline::fit_transform`]
#[derive(Debug, Clone)]
pub struct FittedFeatures {
    pub features: FeatureMatrix,
    /// 1.0 where deaths exceed the dataset median, else 0.0
    pub labels: Array1<f64>,
    pub state: PipelineState,
    pub report: ValidationReport,
}

/// Stateless feature pipeline; all learned values live in [`PipelineState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturePipeline;

impl FeaturePipeline {
    pub fn new() -> Self {
        Self
    }

    /// Drop rows with missing required fields or impossible counts
    pub fn validate(&self, raw: &[RawRecord]) -> Result<(Vec<MortalityRecord>, ValidationReport)> {
        if raw.is_empty() {
            return Err(MortalityError::Validation("no records supplied".to_string()));
        }

        let mut report = ValidationReport {
            total: raw.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(raw.len());

        for row in raw {
            match MortalityRecord::try_from(row) {
                Ok(record) if record.deaths < 0 || record.population <= 0 => {
                    report.dropped_invalid += 1;
                }
                Ok(record) => records.push(record),
                Err(_) => report.dropped_missing += 1,
            }
        }
        report.kept = records.len();

        if report.dropped() > 0 {
            warn!(
                total = report.total,
                dropped_missing = report.dropped_missing,
                dropped_invalid = report.dropped_invalid,
                "Dropped rows during validation"
            );
        }

        if records.is_empty() {
            return Err(MortalityError::Validation(format!(
                "all {} records were dropped during validation",
                report.total
            )));
        }

        Ok((records, report))
    }

    /// Validate, fit all statistics and produce the training matrix and labels
    pub fn fit_transform(&self, raw: &[RawRecord]) -> Result<FittedFeatures> {
        let (records, report) = self.validate(raw)?;
        let state = self.fit(&records)?;

        let inputs: Vec<FeatureInput> = records.iter().map(|r| r.feature_input()).collect();
        let features = self.transform(&inputs, &state)?;

        let deaths: Vec<f64> = records.iter().map(|r| r.deaths as f64).collect();
        let median_deaths = median(&deaths);
        let labels = Array1::from_iter(
            deaths.iter().map(|&d| if d > median_deaths { 1.0 } else { 0.0 }),
        );

        info!(
            rows = records.len(),
            dropped = report.dropped(),
            median_deaths,
            positives = labels.iter().filter(|&&y| y > 0.5).count(),
            "Fitted feature pipeline"
        );

        Ok(FittedFeatures {
            features,
            labels,
            state,
            report,
        })
    }

    fn fit(&self, records: &[MortalityRecord]) -> Result<PipelineState> {
        let rates: Vec<f64> = records.iter().map(|r| r.mortality_rate()).collect();
        let populations: Vec<f64> = records.iter().map(|r| r.population as f64).collect();
        let years: Vec<f64> = records.iter().map(|r| r.year as f64).collect();

        let encoders = CATEGORICAL_FEATURES
            .iter()
            .map(|&field| {
                LabelEncoder::fit(field, records.iter().map(|r| categorical_value(r, field)))
            })
            .collect::<Result<Vec<_>>>()?;

        let scaler = StandardScaler::fit(&NUMERIC_FEATURES, &[years, populations.clone()])?;

        let state = PipelineState {
            feature_columns: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            encoders,
            scaler,
            high_mortality_threshold: quantile(&rates, HIGH_MORTALITY_QUANTILE),
            mortality_buckets: QuantileBuckets::fit(&rates, MORTALITY_BUCKETS)?,
            density_buckets: QuantileBuckets::fit(&populations, DENSITY_BUCKETS)?,
            fitted_rows: records.len(),
        };

        debug!(
            threshold = state.high_mortality_threshold,
            mortality_edges = ?state.mortality_buckets.edges(),
            density_edges = ?state.density_buckets.edges(),
            "Pipeline statistics"
        );

        Ok(state)
    }

    /// Apply a fitted state to model inputs; never mutates the state
    pub fn transform(&self, inputs: &[FeatureInput], state: &PipelineState) -> Result<FeatureMatrix> {
        state.check_columns()?;

        let mut values = Array2::zeros((inputs.len(), FEATURE_COLUMNS.len()));
        for (i, input) in inputs.iter().enumerate() {
            let row = encode_row(input, state)?;
            for (j, v) in row.iter().enumerate() {
                values[[i, j]] = *v;
            }
        }

        Ok(FeatureMatrix {
            values,
            columns: state.feature_columns.clone(),
        })
    }

    /// Validate raw rows the same way `fit_transform` does, then transform
    pub fn transform_raw(&self, raw: &[RawRecord], state: &PipelineState) -> Result<FeatureMatrix> {
        let (records, _) = self.validate(raw)?;
        let inputs: Vec<FeatureInput> = records.iter().map(|r| r.feature_input()).collect();
        self.transform(&inputs, state)
    }

    /// Derived features computed against the frozen fit-time statistics
    pub fn engineer(&self, records: &[MortalityRecord], state: &PipelineState) -> Vec<EngineeredRecord> {
        records
            .iter()
            .map(|record| {
                let rate = record.mortality_rate();
                EngineeredRecord {
                    mortality_rate: rate,
                    high_mortality: rate > state.high_mortality_threshold,
                    is_male: record.gender == "Male",
                    mortality_category: MortalityCategory::ALL
                        [state.mortality_buckets.bucket(rate)],
                    population_density: PopulationDensity::ALL
                        [state.density_buckets.bucket(record.population as f64)],
                    is_west_coast: WEST_COAST_STATES.contains(&record.state.as_str()),
                    is_east_coast: EAST_COAST_STATES.contains(&record.state.as_str()),
                    record: record.clone(),
                }
            })
            .collect()
    }
}

fn categorical_value<'a>(record: &'a MortalityRecord, field: &str) -> &'a str {
    match field {
        "county" => &record.county,
        "ten_year_age_groups" => &record.ten_year_age_groups,
        "gender" => &record.gender,
        _ => &record.state,
    }
}

fn input_categorical<'a>(input: &'a FeatureInput, field: &str) -> &'a str {
    match field {
        "county" => &input.county,
        "ten_year_age_groups" => &input.ten_year_age_groups,
        "gender" => &input.gender,
        _ => &input.state,
    }
}

fn encode_row(input: &FeatureInput, state: &PipelineState) -> Result<[f64; 6]> {
    let mut row = [0.0; 6];
    for (j, column) in state.feature_columns.iter().enumerate() {
        row[j] = match column.as_str() {
            "year" => state.scaler.scale(0, input.year as f64),
            "population" => state.scaler.scale(1, input.population as f64),
            field => {
                let encoder = state.encoder(field).ok_or_else(|| {
                    MortalityError::Validation(format!("no encoder fitted for {}", field))
                })?;
                encoder.encode(input_categorical(input, field))? as f64
            }
        };
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(county: &str, gender: &str, state: &str, deaths: i64, population: i64) -> RawRecord {
        RawRecord {
            county: Some(county.to_string()),
            ten_year_age_groups: Some("65-74 years".to_string()),
            gender: Some(gender.to_string()),
            year: Some(2010),
            icd_10_113_cause_list: Some("Influenza and pneumonia".to_string()),
            deaths: Some(deaths),
            population: Some(population),
            crude_rate: None,
            state: Some(state.to_string()),
        }
    }

    fn sample() -> Vec<RawRecord> {
        vec![
            raw("Kings", "Male", "New York", 25, 10_000),
            raw("Marin", "Female", "California", 150, 50_000),
            raw("Dade", "Male", "Florida", 40, 20_000),
            raw("Travis", "Female", "Texas", 10, 40_000),
            raw("Lane", "Male", "Oregon", 90, 30_000),
            raw("Cook", "Female", "Illinois", 300, 90_000),
        ]
    }

    #[test]
    fn test_fit_transform_shapes() {
        let fitted = FeaturePipeline::new().fit_transform(&sample()).unwrap();
        assert_eq!(fitted.features.nrows(), 6);
        assert_eq!(fitted.features.ncols(), FEATURE_COLUMNS.len());
        assert_eq!(fitted.labels.len(), 6);
        assert_eq!(fitted.report.kept, 6);
    }

    #[test]
    fn test_labels_above_median() {
        // deaths sorted: 10 25 40 90 150 300, median 65
        let fitted = FeaturePipeline::new().fit_transform(&sample()).unwrap();
        let expected = [0.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        assert_eq!(fitted.labels.to_vec(), expected.to_vec());
    }

    #[test]
    fn test_transform_reproduces_fit_matrix() {
        let pipeline = FeaturePipeline::new();
        let data = sample();
        let fitted = pipeline.fit_transform(&data).unwrap();
        let again = pipeline.transform_raw(&data, &fitted.state).unwrap();
        assert_eq!(again, fitted.features);
    }

    #[test]
    fn test_unknown_category_at_transform() {
        let pipeline = FeaturePipeline::new();
        let fitted = pipeline.fit_transform(&sample()).unwrap();
        let input = FeatureInput {
            county: "Nowhere".to_string(),
            ten_year_age_groups: "65-74 years".to_string(),
            gender: "Male".to_string(),
            year: 2012,
            population: 1000,
            state: "Texas".to_string(),
        };
        let err = pipeline.transform(&[input], &fitted.state).unwrap_err();
        assert!(matches!(err, MortalityError::UnknownCategory { ref field, .. } if field == "county"));
    }

    #[test]
    fn test_validation_drops_and_counts() {
        let mut data = sample();
        data.push(RawRecord::default());
        data.push(raw("Zero", "Male", "Ohio", 5, 0));
        let fitted = FeaturePipeline::new().fit_transform(&data).unwrap();
        assert_eq!(fitted.report.total, 8);
        assert_eq!(fitted.report.dropped_missing, 1);
        assert_eq!(fitted.report.dropped_invalid, 1);
        assert_eq!(fitted.features.nrows(), 6);
    }

    #[test]
    fn test_engineer_uses_frozen_statistics() {
        let pipeline = FeaturePipeline::new();
        let fitted = pipeline.fit_transform(&sample()).unwrap();
        let (records, _) = pipeline.validate(&sample()).unwrap();
        let engineered = pipeline.engineer(&records, &fitted.state);

        assert!((engineered[0].mortality_rate - 250.0).abs() < 1e-9);
        assert!((engineered[1].mortality_rate - 300.0).abs() < 1e-9);
        assert!(engineered[0].is_east_coast);
        assert!(engineered[1].is_west_coast);
        assert!(engineered[0].is_male);

        // A single later record is bucketed by the fit-time edges, not its own
        let lone = pipeline.engineer(&records[3..4], &fitted.state);
        assert_eq!(lone[0].mortality_category, MortalityCategory::VeryLow);
        assert_eq!(lone[0].population_density, engineered[3].population_density);
    }

    #[test]
    fn test_state_roundtrip_bytes() {
        let fitted = FeaturePipeline::new().fit_transform(&sample()).unwrap();
        let bytes = fitted.state.to_bytes().unwrap();
        let restored = PipelineState::from_bytes(&bytes).unwrap();
        assert_eq!(restored, fitted.state);
    }

    #[test]
    fn test_reordered_state_columns_rejected() {
        let pipeline = FeaturePipeline::new();
        let fitted = pipeline.fit_transform(&sample()).unwrap();

        let mut stored = serde_json::to_value(&fitted.state).unwrap();
        let columns = stored["feature_columns"].as_array_mut().unwrap();
        columns.swap(0, 2);
        let reordered: PipelineState = serde_json::from_value(stored).unwrap();
        assert_eq!(reordered.feature_columns()[0], "gender");

        let input = FeatureInput {
            county: "Kings".to_string(),
            ten_year_age_groups: "65-74 years".to_string(),
            gender: "Male".to_string(),
            year: 2010,
            population: 10_000,
            state: "New York".to_string(),
        };
        let err = pipeline.transform(&[input.clone()], &reordered).unwrap_err();
        assert!(matches!(err, MortalityError::Validation(_)));
        assert!(pipeline.transform(&[input], &fitted.state).is_ok());
    }
}
