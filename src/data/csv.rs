//! CSV import of raw mortality rows

use crate::error::{MortalityError, Result};
use crate::preprocessing::RawRecord;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Columns a mortality CSV must carry
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "county",
    "ten_year_age_groups",
    "gender",
    "year",
    "icd_10_113_cause_list",
    "deaths",
    "population",
    "state",
];

/// Read a CSV export into raw records.
///
/// Empty or unparsable cells become `None`; dropping them is left to
/// `FeaturePipeline::validate`.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        return Err(MortalityError::Validation(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let county = string_column(&df, "county")?;
    let age_groups = string_column(&df, "ten_year_age_groups")?;
    let gender = string_column(&df, "gender")?;
    let year = int_column(&df, "year")?;
    let cause = string_column(&df, "icd_10_113_cause_list")?;
    let deaths = int_column(&df, "deaths")?;
    let population = int_column(&df, "population")?;
    let state = string_column(&df, "state")?;
    let crude_rate = if df.column("crude_rate").is_ok() {
        string_column(&df, "crude_rate")?
    } else {
        vec![None; df.height()]
    };

    let records: Vec<RawRecord> = (0..df.height())
        .map(|i| RawRecord {
            county: county[i].clone(),
            ten_year_age_groups: age_groups[i].clone(),
            gender: gender[i].clone(),
            year: year[i],
            icd_10_113_cause_list: cause[i].clone(),
            deaths: deaths[i],
            population: population[i],
            crude_rate: crude_rate[i].clone(),
            state: state[i].clone(),
        })
        .collect();

    info!(path = %path.display(), rows = records.len(), "Loaded mortality CSV");
    Ok(records)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}
