//! Standard (z-score) scaling for numeric features

use crate::error::{MortalityError, Result};
use serde::{Deserialize, Serialize};

/// Fitted center/scale for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub std: f64,
}

/// Per-column standard scaler.
///
/// Uses the population standard deviation (ddof = 0); a constant column
/// scales by 1 so the transform stays finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
}

impl StandardScaler {
    /// Fit one `ScalerParams` per named column; `columns[i]` holds its values
    pub fn fit(names: &[&str], columns: &[Vec<f64>]) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("{} columns", names.len()),
                actual: format!("{} columns", columns.len()),
            });
        }

        let params = names
            .iter()
            .zip(columns)
            .map(|(name, values)| {
                if values.is_empty() {
                    return Err(MortalityError::Validation(format!(
                        "cannot fit scaler for {} on an empty column",
                        name
                    )));
                }
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                Ok(ScalerParams {
                    mean,
                    std: if std == 0.0 { 1.0 } else { std },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            columns: names.iter().map(|s| s.to_string()).collect(),
            params,
        })
    }

    /// Scale a value of the column at `idx`
    pub fn scale(&self, idx: usize, value: f64) -> f64 {
        let p = &self.params[idx];
        (value - p.mean) / p.std
    }

    /// Undo `scale`
    pub fn unscale(&self, idx: usize, value: f64) -> f64 {
        let p = &self.params[idx];
        value * p.std + p.mean
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn params(&self, column: &str) -> Option<ScalerParams> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.params[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let scaler = StandardScaler::fit(&["a"], &[vec![1.0, 2.0, 3.0, 4.0, 5.0]]).unwrap();
        let scaled: Vec<f64> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&v| scaler.scale(0, v))
            .collect();

        let mean: f64 = scaled.iter().sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-10);
        // population std of 1..5 is sqrt(2)
        assert!((scaled[4] - 2.0 / 2f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column() {
        let scaler = StandardScaler::fit(&["a"], &[vec![7.0, 7.0, 7.0]]).unwrap();
        assert_eq!(scaler.scale(0, 7.0), 0.0);
        assert_eq!(scaler.params("a").unwrap().std, 1.0);
    }

    #[test]
    fn test_inverse() {
        let scaler = StandardScaler::fit(&["a"], &[vec![10.0, 20.0, 60.0]]).unwrap();
        let v = scaler.unscale(0, scaler.scale(0, 42.0));
        assert!((v - 42.0).abs() < 1e-10);
    }
}
