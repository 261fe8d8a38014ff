//! Regularized logistic regression

use super::family::{LogisticRegressionParams, Penalty};
use crate::error::{MortalityError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Logistic regression for binary classification, fit by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Inverse regularization strength
    pub c: f64,
    pub penalty: Penalty,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
    /// Iterations run by the last `fit`
    pub n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::from_params(&LogisticRegressionParams::default())
    }

    pub fn from_params(params: &LogisticRegressionParams) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            c: params.c,
            penalty: params.penalty,
            max_iter: params.max_iter,
            tol: params.tol,
            learning_rate: params.learning_rate,
            n_iter: 0,
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Fit with an `1/(C·n)` penalty on the weights; the intercept is not penalized.
    ///
    /// L2 adds the penalty gradient, L1 applies a soft-threshold after each step.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(MortalityError::Training("cannot fit on zero rows".to_string()));
        }

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;

        let lr = self.learning_rate;
        let lambda = 1.0 / (self.c * n_samples as f64);
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;

            let linear = x.dot(&weights) + bias;
            let errors = Self::sigmoid(&linear) - y;

            let mut dw = x.t().dot(&errors) / n_samples as f64;
            if self.penalty == Penalty::L2 {
                dw = dw + lambda * &weights;
            }
            let db = errors.mean().unwrap_or(0.0);

            let previous = weights.clone();
            weights = weights - lr * &dw;
            bias -= lr * db;

            if self.penalty == Penalty::L1 {
                let shrink = lr * lambda;
                weights.mapv_inplace(|w| w.signum() * (w.abs() - shrink).max(0.0));
            }

            let step = (&weights - &previous).mapv(|v| v * v).sum() + (lr * db).powi(2);
            if step.sqrt() < self.tol {
                break;
            }
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.n_iter = iterations;

        Ok(self)
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(MortalityError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(MortalityError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let linear = x.dot(coefficients) + self.intercept.unwrap_or(0.0);
        Ok(Self::sigmoid(&linear))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![[-2.0, 1.0], [-1.5, 0.5], [-1.0, 1.0], [1.0, 1.0], [1.5, 0.5], [2.0, 1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_predict_proba_ordering() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[5] > 0.5);
    }

    #[test]
    fn test_stronger_l2_shrinks_weights() {
        let (x, y) = separable();
        let mut weak = LogisticRegression::new().with_c(10.0);
        let mut strong = LogisticRegression::new().with_c(0.1);
        weak.fit(&x, &y).unwrap();
        strong.fit(&x, &y).unwrap();

        let w_weak = weak.coefficients.as_ref().unwrap()[0].abs();
        let w_strong = strong.coefficients.as_ref().unwrap()[0].abs();
        assert!(w_strong < w_weak);
    }

    #[test]
    fn test_l1_zeroes_useless_feature() {
        // Second column carries no signal
        let x = array![[-2.0, 0.3], [-1.0, -0.3], [-1.5, 0.3], [1.0, -0.3], [2.0, 0.3], [1.5, -0.3]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new().with_penalty(Penalty::L1).with_c(0.5);
        model.fit(&x, &y).unwrap();

        let w = model.coefficients.as_ref().unwrap();
        assert!(w[0] > 0.0);
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict_proba(&array![[0.0, 0.0]]),
            Err(MortalityError::ModelNotFitted)
        ));
    }
}
