//! Classifier kinds and the fitted-classifier union

use crate::forest::RandomForest;
use crate::logistic::LogisticRegression;
use idmatch_core::{Error, MatchConfig, Result};
use idmatch_similarity::FeatureVector;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    RandomForest,
    LogisticRegression,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::RandomForest => "random_forest",
            ClassifierKind::LogisticRegression => "logistic_regression",
        }
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random_forest" => Ok(ClassifierKind::RandomForest),
            "logistic_regression" => Ok(ClassifierKind::LogisticRegression),
            other => Err(Error::UnsupportedClassifierKind(other.to_string())),
        }
    }
}

/// A fitted binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForest),
    LogisticRegression(LogisticRegression),
}

impl Classifier {
    pub fn fit(
        kind: ClassifierKind,
        x: &[FeatureVector],
        y: &[bool],
        config: &MatchConfig,
    ) -> Result<Self> {
        match kind {
            ClassifierKind::RandomForest => {
                RandomForest::fit(x, y, &config.forest, config.random_seed)
                    .map(Classifier::RandomForest)
            }
            ClassifierKind::LogisticRegression => {
                LogisticRegression::fit(x, y, &config.logistic).map(Classifier::LogisticRegression)
            }
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Classifier::RandomForest(_) => ClassifierKind::RandomForest,
            Classifier::LogisticRegression(_) => ClassifierKind::LogisticRegression,
        }
    }

    /// Probability of the positive (same person) class
    pub fn predict_proba(&self, x: &FeatureVector) -> f64 {
        let p = match self {
            Classifier::RandomForest(forest) => forest.predict_proba(x),
            Classifier::LogisticRegression(model) => model.predict_proba(x),
        };
        p.clamp(0.0, 1.0)
    }

    /// Hard label, positive only when the probability exceeds one half
    pub fn predict(&self, x: &FeatureVector) -> bool {
        self.predict_proba(x) > 0.5
    }
}
