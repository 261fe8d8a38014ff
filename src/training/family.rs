//! Model families and their hyperparameter schemas

use crate::error::{MortalityError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Closed set of trainable classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    LogisticRegression,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 2] = [ModelFamily::RandomForest, ModelFamily::LogisticRegression];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::LogisticRegression => "logistic_regression",
        }
    }

    pub fn default_params(&self) -> Hyperparameters {
        match self {
            ModelFamily::RandomForest => Hyperparameters::RandomForest(RandomForestParams::default()),
            ModelFamily::LogisticRegression => {
                Hyperparameters::LogisticRegression(LogisticRegressionParams::default())
            }
        }
    }

    /// Merge a JSON object of overrides onto this family's defaults.
    ///
    /// Unknown keys and values of the wrong type are rejected.
    pub fn parse_params(&self, overrides: Option<&Map<String, Value>>) -> Result<Hyperparameters> {
        let params = match self {
            ModelFamily::RandomForest => {
                Hyperparameters::RandomForest(merge(RandomForestParams::default(), overrides)?)
            }
            ModelFamily::LogisticRegression => {
                Hyperparameters::LogisticRegression(merge(LogisticRegressionParams::default(), overrides)?)
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Fixed tuning grid, in evaluation order
    pub fn grid(&self) -> Vec<Hyperparameters> {
        match self {
            ModelFamily::RandomForest => {
                let mut grid = Vec::new();
                for n_estimators in [50, 100, 200] {
                    for max_depth in [Some(5), Some(10), Some(15), None] {
                        for min_samples_split in [2, 5, 10] {
                            for min_samples_leaf in [1, 2, 4] {
                                grid.push(Hyperparameters::RandomForest(RandomForestParams {
                                    n_estimators,
                                    max_depth,
                                    min_samples_split,
                                    min_samples_leaf,
                                    ..Default::default()
                                }));
                            }
                        }
                    }
                }
                grid
            }
            ModelFamily::LogisticRegression => {
                let mut grid = Vec::new();
                for c in [0.1, 1.0, 10.0] {
                    for penalty in [Penalty::L1, Penalty::L2] {
                        grid.push(Hyperparameters::LogisticRegression(LogisticRegressionParams {
                            c,
                            penalty,
                            ..Default::default()
                        }));
                    }
                }
                grid
            }
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = MortalityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_forest" => Ok(ModelFamily::RandomForest),
            "logistic_regression" => Ok(ModelFamily::LogisticRegression),
            other => Err(MortalityError::UnsupportedModelFamily(other.to_string())),
        }
    }
}

fn merge<P>(defaults: P, overrides: Option<&Map<String, Value>>) -> Result<P>
where
    P: Serialize + for<'de> Deserialize<'de>,
{
    let Some(overrides) = overrides else {
        return Ok(defaults);
    };

    let mut base = match serde_json::to_value(&defaults)? {
        Value::Object(map) => map,
        _ => return Err(MortalityError::Serialization("params must serialize to an object".to_string())),
    };

    for (key, value) in overrides {
        if !base.contains_key(key) {
            return Err(MortalityError::Validation(format!("unknown hyperparameter: {}", key)));
        }
        base.insert(key.clone(), value.clone());
    }

    serde_json::from_value(Value::Object(base))
        .map_err(|e| MortalityError::Validation(format!("invalid hyperparameters: {}", e)))
}

/// Random forest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 5,
            min_samples_leaf: 1,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

/// Logistic regression settings; `C` is the inverse regularization strength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionParams {
    #[serde(rename = "C")]
    pub c: f64,
    pub penalty: Penalty,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
    pub random_state: u64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
            random_state: 42,
        }
    }
}

/// Hyperparameters tagged with the family they belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Hyperparameters {
    RandomForest(RandomForestParams),
    LogisticRegression(LogisticRegressionParams),
}

impl Hyperparameters {
    pub fn family(&self) -> ModelFamily {
        match self {
            Hyperparameters::RandomForest(_) => ModelFamily::RandomForest,
            Hyperparameters::LogisticRegression(_) => ModelFamily::LogisticRegression,
        }
    }

    /// Range checks the type system cannot express
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(MortalityError::Validation(msg.to_string()));
        match self {
            Hyperparameters::RandomForest(p) => {
                if p.n_estimators == 0 {
                    return fail("n_estimators must be at least 1");
                }
                if p.max_depth == Some(0) {
                    return fail("max_depth must be at least 1");
                }
                if p.min_samples_split < 2 {
                    return fail("min_samples_split must be at least 2");
                }
                if p.min_samples_leaf == 0 {
                    return fail("min_samples_leaf must be at least 1");
                }
            }
            Hyperparameters::LogisticRegression(p) => {
                if !(p.c > 0.0 && p.c.is_finite()) {
                    return fail("C must be a positive number");
                }
                if p.max_iter == 0 {
                    return fail("max_iter must be at least 1");
                }
                if !(p.learning_rate > 0.0 && p.learning_rate.is_finite()) {
                    return fail("learning_rate must be a positive number");
                }
                if p.tol < 0.0 {
                    return fail("tol must not be negative");
                }
            }
        }
        Ok(())
    }

    /// Flat JSON view used for run logs and artifact metadata
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
