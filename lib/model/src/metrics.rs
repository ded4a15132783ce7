//! Binary classification metrics

use idmatch_core::{Error, Result};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Fraction of predictions equal to the truth; 0.0 for no samples
pub fn accuracy(y_true: &[bool], y_pred: &[bool]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic
///
/// Tied scores share their average rank. Needs both classes present.
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(Error::Training(format!(
            "roc_auc: {} labels but {} scores",
            y_true.len(),
            scores.len()
        )));
    }
    let positives = y_true.iter().filter(|&&t| t).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::Training(
            "Only one class present in y_true. ROC AUC score is not defined in that case".into(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(scores[i]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && OrderedFloat(scores[order[end]]) == OrderedFloat(scores[order[start]]) {
            end += 1;
        }
        // Ranks are 1-based; the tie group spans ranks start+1..=end
        let average_rank = (start + 1 + end) as f64 / 2.0;
        positive_rank_sum += average_rank * order[start..end].iter().filter(|&&i| y_true[i]).count() as f64;
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Precision, recall and F1 for one class (or an average over classes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class metrics plus macro and support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    #[serde(rename = "0")]
    pub negative: ClassMetrics,
    #[serde(rename = "1")]
    pub positive: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

/// Undefined ratios (zero denominators) count as 0.0
pub fn classification_report(y_true: &[bool], y_pred: &[bool]) -> ClassificationReport {
    let negative = class_metrics(y_true, y_pred, false);
    let positive = class_metrics(y_true, y_pred, true);
    let total = negative.support + positive.support;

    let macro_avg = ClassMetrics {
        precision: (negative.precision + positive.precision) / 2.0,
        recall: (negative.recall + positive.recall) / 2.0,
        f1_score: (negative.f1_score + positive.f1_score) / 2.0,
        support: total,
    };

    let weighted = |f: fn(&ClassMetrics) -> f64| {
        if total == 0 {
            0.0
        } else {
            (f(&negative) * negative.support as f64 + f(&positive) * positive.support as f64)
                / total as f64
        }
    };
    let weighted_avg = ClassMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1_score: weighted(|m| m.f1_score),
        support: total,
    };

    ClassificationReport {
        negative,
        positive,
        accuracy: accuracy(y_true, y_pred),
        macro_avg,
        weighted_avg,
    }
}

fn class_metrics(y_true: &[bool], y_pred: &[bool], class: bool) -> ClassMetrics {
    let mut true_positive = 0usize;
    let mut predicted = 0usize;
    let mut support = 0usize;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if p == class {
            predicted += 1;
        }
        if t == class {
            support += 1;
            if p == class {
                true_positive += 1;
            }
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(true_positive, predicted);
    let recall = ratio(true_positive, support);
    let f1_score = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ClassMetrics {
        precision,
        recall,
        f1_score,
        support,
    }
}
