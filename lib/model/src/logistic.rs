//! L2-regularized logistic regression

use idmatch_core::{Error, LogisticParams, Result};
use idmatch_similarity::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Gradient norm below which fitting stops early
const TOLERANCE: f64 = 1e-6;

/// Linear model fitted by full-batch gradient descent on the mean log-loss
/// plus `||w||^2 / (2 * C * n)`, where `C` is `l2_penalty`. The intercept is
/// not regularized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: [f64; FEATURE_COUNT],
    bias: f64,
}

impl LogisticRegression {
    pub fn fit(x: &[FeatureVector], y: &[bool], params: &LogisticParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::Training(format!(
                "logistic regression needs matching non-empty inputs (got {} rows, {} labels)",
                x.len(),
                y.len()
            )));
        }
        if !(params.l2_penalty > 0.0) || !(params.learning_rate > 0.0) {
            return Err(Error::Training(
                "logistic regression needs positive l2_penalty and learning_rate".into(),
            ));
        }

        let n = x.len() as f64;
        let mut model = Self {
            weights: [0.0; FEATURE_COUNT],
            bias: 0.0,
        };

        for iteration in 0..params.max_iter {
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let error = model.predict_proba(row) - if label { 1.0 } else { 0.0 };
                for (g, v) in grad_w.iter_mut().zip(row.0.iter()) {
                    *g += error * v;
                }
                grad_b += error;
            }

            let mut norm = 0.0;
            for (g, w) in grad_w.iter_mut().zip(model.weights.iter()) {
                *g = *g / n + w / (params.l2_penalty * n);
                norm += *g * *g;
            }
            grad_b /= n;
            norm += grad_b * grad_b;

            if norm.sqrt() < TOLERANCE {
                tracing::debug!("Logistic regression converged after {} iterations", iteration);
                break;
            }

            for (w, g) in model.weights.iter_mut().zip(grad_w.iter()) {
                *w -= params.learning_rate * g;
            }
            model.bias -= params.learning_rate * grad_b;
        }

        Ok(model)
    }

    pub fn decision_function(&self, x: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .zip(x.0.iter())
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }

    pub fn predict_proba(&self, x: &FeatureVector) -> f64 {
        sigmoid(self.decision_function(x))
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
