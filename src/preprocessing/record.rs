//! Record types flowing through the feature pipeline

use serde::{Deserialize, Serialize};

/// Row as it arrives from the data store or a CSV import.
///
/// Every field is optional; `FeaturePipeline::validate` drops incomplete rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub county: Option<String>,
    pub ten_year_age_groups: Option<String>,
    pub gender: Option<String>,
    pub year: Option<i64>,
    pub icd_10_113_cause_list: Option<String>,
    pub deaths: Option<i64>,
    pub population: Option<i64>,
    pub crude_rate: Option<String>,
    pub state: Option<String>,
}

/// Row with every required field present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub county: String,
    pub ten_year_age_groups: String,
    pub gender: String,
    pub year: i64,
    pub icd_10_113_cause_list: String,
    pub deaths: i64,
    pub population: i64,
    pub crude_rate: Option<String>,
    pub state: String,
}

impl MortalityRecord {
    /// Deaths per 100,000 population
    pub fn mortality_rate(&self) -> f64 {
        mortality_rate(self.deaths, self.population)
    }

    /// Model input fields of this record
    pub fn feature_input(&self) -> FeatureInput {
        FeatureInput {
            county: self.county.clone(),
            ten_year_age_groups: self.ten_year_age_groups.clone(),
            gender: self.gender.clone(),
            year: self.year,
            population: self.population,
            state: self.state.clone(),
        }
    }
}

impl TryFrom<&RawRecord> for MortalityRecord {
    type Error = Vec<&'static str>;

    /// Fails with the names of the missing required fields
    fn try_from(raw: &RawRecord) -> std::result::Result<Self, Self::Error> {
        let mut missing = Vec::new();
        if raw.county.is_none() {
            missing.push("county");
        }
        if raw.ten_year_age_groups.is_none() {
            missing.push("ten_year_age_groups");
        }
        if raw.gender.is_none() {
            missing.push("gender");
        }
        if raw.year.is_none() {
            missing.push("year");
        }
        if raw.icd_10_113_cause_list.is_none() {
            missing.push("icd_10_113_cause_list");
        }
        if raw.deaths.is_none() {
            missing.push("deaths");
        }
        if raw.population.is_none() {
            missing.push("population");
        }
        if raw.state.is_none() {
            missing.push("state");
        }

        match (
            &raw.county,
            &raw.ten_year_age_groups,
            &raw.gender,
            raw.year,
            &raw.icd_10_113_cause_list,
            raw.deaths,
            raw.population,
            &raw.state,
        ) {
            (Some(county), Some(age), Some(gender), Some(year), Some(cause), Some(deaths), Some(population), Some(state)) => {
                Ok(Self {
                    county: county.clone(),
                    ten_year_age_groups: age.clone(),
                    gender: gender.clone(),
                    year,
                    icd_10_113_cause_list: cause.clone(),
                    deaths,
                    population,
                    crude_rate: raw.crude_rate.clone(),
                    state: state.clone(),
                })
            }
            _ => Err(missing),
        }
    }
}

/// Fields the classifier consumes, also the shape of a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    pub county: String,
    pub ten_year_age_groups: String,
    pub gender: String,
    pub year: i64,
    pub population: i64,
    pub state: String,
}

/// Bucket of `mortality_rate` by fit-time quintiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MortalityCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl MortalityCategory {
    pub const ALL: [MortalityCategory; 5] = [
        MortalityCategory::VeryLow,
        MortalityCategory::Low,
        MortalityCategory::Medium,
        MortalityCategory::High,
        MortalityCategory::VeryHigh,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MortalityCategory::VeryLow => "Very Low",
            MortalityCategory::Low => "Low",
            MortalityCategory::Medium => "Medium",
            MortalityCategory::High => "High",
            MortalityCategory::VeryHigh => "Very High",
        }
    }
}

/// Bucket of `population` by fit-time terciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopulationDensity {
    Low,
    Medium,
    High,
}

impl PopulationDensity {
    pub const ALL: [PopulationDensity; 3] = [
        PopulationDensity::Low,
        PopulationDensity::Medium,
        PopulationDensity::High,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PopulationDensity::Low => "Low Density",
            PopulationDensity::Medium => "Medium Density",
            PopulationDensity::High => "High Density",
        }
    }
}

/// Validated record plus its derived features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredRecord {
    pub record: MortalityRecord,
    pub mortality_rate: f64,
    pub high_mortality: bool,
    pub is_male: bool,
    pub mortality_category: MortalityCategory,
    pub population_density: PopulationDensity,
    pub is_west_coast: bool,
    pub is_east_coast: bool,
}

pub const WEST_COAST_STATES: [&str; 3] = ["California", "Oregon", "Washington"];
pub const EAST_COAST_STATES: [&str; 3] = ["New York", "Massachusetts", "Florida"];

/// Deaths per 100,000 population
pub fn mortality_rate(deaths: i64, population: i64) -> f64 {
    deaths as f64 / population as f64 * 100_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mortality_rate_examples() {
        assert!((mortality_rate(25, 10_000) - 250.0).abs() < 1e-9);
        assert!((mortality_rate(150, 50_000) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_reported() {
        let raw = RawRecord {
            county: Some("Kings".to_string()),
            ..Default::default()
        };
        let missing = MortalityRecord::try_from(&raw).unwrap_err();
        assert!(missing.contains(&"deaths"));
        assert!(missing.contains(&"state"));
        assert!(!missing.contains(&"county"));
    }
}
