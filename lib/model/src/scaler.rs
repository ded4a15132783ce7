//! Per-feature standardization

use idmatch_core::{Error, Result};
use idmatch_similarity::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Centers each feature on its mean and divides by its population standard
/// deviation. Constant features keep a scale of 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    pub fn fit(rows: &[FeatureVector]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::Training("cannot fit scaler on an empty dataset".into()));
        }
        let n = rows.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.0.iter()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = [0.0; FEATURE_COUNT];
        for row in rows {
            for ((v, x), m) in variance.iter_mut().zip(row.0.iter()).zip(mean.iter()) {
                *v += (x - m) * (x - m);
            }
        }

        let scale = variance.map(|v| {
            let std = (v / n).sqrt();
            if std > f64::EPSILON {
                std
            } else {
                1.0
            }
        });

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = row.0;
        for ((x, m), s) in out.iter_mut().zip(self.mean.iter()).zip(self.scale.iter()) {
            *x = (*x - m) / s;
        }
        FeatureVector(out)
    }

    pub fn transform_all(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|row| self.transform(row)).collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}
