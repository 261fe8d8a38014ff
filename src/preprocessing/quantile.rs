//! Quantile statistics and equal-frequency bucketing

use crate::error::{MortalityError, Result};
use serde::{Deserialize, Serialize};

/// Quantile of already-sorted data using linear interpolation
/// between the two nearest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Quantile of unsorted data
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

/// Median with midpoint interpolation for even counts
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Equal-frequency bucket edges frozen at fit time.
///
/// `edges` holds `n_buckets + 1` values, from the fit minimum to the fit
/// maximum. Buckets are right-closed with the lowest edge included.
/// Values outside the fitted range land in the first or last bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileBuckets {
    edges: Vec<f64>,
}

impl QuantileBuckets {
    pub fn fit(values: &[f64], n_buckets: usize) -> Result<Self> {
        if n_buckets < 2 {
            return Err(MortalityError::Validation(format!(
                "need at least 2 buckets, got {}",
                n_buckets
            )));
        }
        if values.is_empty() {
            return Err(MortalityError::Validation(
                "cannot compute quantile buckets of an empty column".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MortalityError::Validation(
                "quantile buckets require finite values".to_string(),
            ));
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let edges = (0..=n_buckets)
            .map(|i| quantile_sorted(&sorted, i as f64 / n_buckets as f64))
            .collect();

        Ok(Self { edges })
    }

    /// Bucket index in `0..n_buckets`
    pub fn bucket(&self, value: f64) -> usize {
        let interior = &self.edges[1..self.edges.len() - 1];
        interior.iter().filter(|&&edge| value > edge).count()
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn n_buckets(&self) -> usize {
        self.edges.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_quantile() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.5), 2.5);
        assert_eq!(quantile(&v, 0.75), 3.25);
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
    }

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn test_buckets_equal_frequency() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let buckets = QuantileBuckets::fit(&values, 5).unwrap();
        let counts = values.iter().fold(vec![0; 5], |mut acc, &v| {
            acc[buckets.bucket(v)] += 1;
            acc
        });
        assert_eq!(counts, vec![2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_right_closed_and_clamped() {
        let buckets = QuantileBuckets::fit(&[0.0, 10.0, 20.0, 30.0], 3).unwrap();
        // interior edges at 10 and 20
        assert_eq!(buckets.bucket(10.0), 0);
        assert_eq!(buckets.bucket(10.5), 1);
        assert_eq!(buckets.bucket(-100.0), 0);
        assert_eq!(buckets.bucket(1e9), 2);
    }
}
