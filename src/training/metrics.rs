//! Classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Validation metrics for a binary classifier.
///
/// Precision, recall and F1 are support-weighted averages over both classes.
/// `auc` is 0.0 when no probabilities are available or when the evaluated
/// labels contain a single class; callers treat it as a degraded value then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub auc: f64,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, y_prob: Option<&Array1<f64>>) -> Self {
        let n = y_true.len();
        if n == 0 {
            return Self::default();
        }

        let (tp, fp, tn, fn_) = confusion_counts(y_true, y_pred);
        let accuracy = (tp + tn) as f64 / n as f64;

        let positive = ClassScores::new(tp, fp, fn_);
        let negative = ClassScores::new(tn, fn_, fp);
        let support_pos = (tp + fn_) as f64;
        let support_neg = (tn + fp) as f64;
        let weighted = |pos: f64, neg: f64| (pos * support_pos + neg * support_neg) / n as f64;

        Self {
            accuracy,
            precision: weighted(positive.precision, negative.precision),
            recall: weighted(positive.recall, negative.recall),
            f1_score: weighted(positive.f1, negative.f1),
            auc: y_prob.map_or(0.0, |p| roc_auc(y_true, p)),
        }
    }
}

struct ClassScores {
    precision: f64,
    recall: f64,
    f1: f64,
}

impl ClassScores {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self { precision, recall, f1 }
    }
}

fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

/// ROC AUC via the Mann-Whitney rank statistic, averaging ranks over ties
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> f64 {
    let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != y_true.len() {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group i..=j
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|&(&y, _)| y > 0.5)
        .map(|(_, &r)| r)
        .sum();

    let n_pos = n_pos as f64;
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}
