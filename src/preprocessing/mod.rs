//! Data preprocessing module
//!
//! Turns raw mortality rows into model-ready matrices:
//! - Null and range validation with a drop report
//! - Label encoding of categorical fields
//! - Standard scaling of `year` and `population`
//! - Derived features against frozen fit-time quantiles

mod encoder;
mod pipeline;
mod quantile;
mod record;
mod scaler;

pub use encoder::LabelEncoder;
pub use pipeline::{
    FeatureMatrix, FeaturePipeline, FittedFeatures, PipelineState, ValidationReport,
    CATEGORICAL_FEATURES, FEATURE_COLUMNS, NUMERIC_FEATURES,
};
pub use quantile::{median, quantile, QuantileBuckets};
pub use record::{
    mortality_rate, EngineeredRecord, FeatureInput, MortalityCategory, MortalityRecord,
    PopulationDensity, RawRecord, EAST_COAST_STATES, WEST_COAST_STATES,
};
pub use scaler::{ScalerParams, StandardScaler};
