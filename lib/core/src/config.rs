//! Match configuration
//!
//! Loaded once per process and shared read-only (`Arc<MatchConfig>`) by every
//! matcher, the trainer and the orchestrator. Every field has a serde default,
//! so a config file only needs to name what it overrides.

use crate::record::Field;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    /// Per-field contribution to the rule-based aggregate
    pub field_weights: FieldWeights,

    /// Rule-based aggregate at or above this is a match
    pub rule_threshold: f64,

    /// Model probability at or above this is a match
    pub ml_threshold: f64,

    /// Whole-word address abbreviation expansions, applied in the order
    /// they are listed. Written as a JSON object, key order preserved.
    #[serde(with = "ordered_pairs")]
    pub address_abbreviations: Vec<(String, String)>,

    pub training_sample_count: usize,
    pub test_split_fraction: f64,
    pub random_seed: u64,

    /// `random_forest` or `logistic_regression`; checked when training starts
    pub classifier: String,

    /// Samples for the ad-hoc model trained when no model was supplied
    pub fallback_sample_count: usize,

    pub forest: ForestParams,
    pub logistic: LogisticParams,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            field_weights: FieldWeights::default(),
            rule_threshold: 0.7,
            ml_threshold: 0.5,
            address_abbreviations: default_abbreviations(),
            training_sample_count: 50_000,
            test_split_fraction: 0.2,
            random_seed: 42,
            classifier: "random_forest".to_string(),
            fallback_sample_count: 1_000,
            forest: ForestParams::default(),
            logistic: LogisticParams::default(),
        }
    }
}

fn default_abbreviations() -> Vec<(String, String)> {
    [
        ("st", "street"),
        ("ave", "avenue"),
        ("rd", "road"),
        ("dr", "drive"),
        ("blvd", "boulevard"),
        ("ln", "lane"),
        ("ct", "court"),
        ("pl", "place"),
        ("cir", "circle"),
    ]
    .into_iter()
    .map(|(abbr, full)| (abbr.to_string(), full.to_string()))
    .collect()
}

impl MatchConfig {
    /// Load a JSON config file and validate it
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut config: MatchConfig = serde_json::from_slice(&data)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate_and_normalize()?;
        tracing::debug!("Loaded match configuration from {:?}", path);
        Ok(config)
    }

    /// Validate the configuration
    /// - Thresholds and the split fraction must be in range
    /// - Weights must be non-negative; they are normalized to sum to 1.0
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        for (name, value) in [
            ("rule_threshold", self.rule_threshold),
            ("ml_threshold", self.ml_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(self.test_split_fraction > 0.0 && self.test_split_fraction < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "test_split_fraction must be in (0, 1), got {}",
                self.test_split_fraction
            )));
        }

        if self.forest.n_estimators == 0 {
            return Err(Error::InvalidConfig("forest.n_estimators must be > 0".into()));
        }

        for (abbr, full) in &self.address_abbreviations {
            if abbr.trim().is_empty() || full.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "address abbreviation '{}' -> '{}' has an empty side",
                    abbr, full
                )));
            }
        }

        self.field_weights.validate_and_normalize()
    }

    /// Expansion for `abbr`, if one is configured
    pub fn abbreviation(&self, abbr: &str) -> Option<&str> {
        self.address_abbreviations
            .iter()
            .find(|(a, _)| a == abbr)
            .map(|(_, full)| full.as_str())
    }
}

/// A JSON object read into and written from a list of pairs in document order
mod ordered_pairs {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<(String, String)>, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of abbreviation to expansion")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs: Vec<(String, String)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    // A repeated key overrides in place
                    match pairs.iter_mut().find(|(k, _)| *k == key) {
                        Some(existing) => existing.1 = value,
                        None => pairs.push((key, value)),
                    }
                }
                Ok(pairs)
            }
        }

        deserializer.deserialize_map(PairsVisitor)
    }
}

/// Weight of each field in the rule-based aggregate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldWeights {
    pub email: f64,
    pub name: f64,
    pub phone: f64,
    pub address: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            email: 0.4,
            name: 0.3,
            phone: 0.2,
            address: 0.1,
        }
    }
}

impl FieldWeights {
    #[inline]
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Email => self.email,
            Field::Name => self.name,
            Field::Phone => self.phone,
            Field::Address => self.address,
        }
    }

    pub fn sum(&self) -> f64 {
        self.email + self.name + self.phone + self.address
    }

    fn validate_and_normalize(&mut self) -> Result<()> {
        for field in Field::ALL {
            let weight = self.get(field);
            if weight < 0.0 || !weight.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "Field '{}' has invalid weight {}",
                    field, weight
                )));
            }
        }

        let weight_sum = self.sum();
        if weight_sum <= 0.0 {
            return Err(Error::InvalidConfig("Total field weight cannot be zero".into()));
        }

        if (weight_sum - 1.0).abs() > 0.001 {
            tracing::warn!(
                "Field weights sum to {}, rescaling to 1.0 (email {}, name {}, phone {}, address {})",
                weight_sum,
                self.email,
                self.name,
                self.phone,
                self.address
            );
            self.email /= weight_sum;
            self.name /= weight_sum;
            self.phone /= weight_sum;
            self.address /= weight_sum;
        }

        Ok(())
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Unlimited depth when `None`
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogisticParams {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Inverse regularization strength, as `C` in common toolkits
    pub l2_penalty: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            learning_rate: 0.5,
            l2_penalty: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.rule_threshold, 0.7);
        assert_eq!(config.ml_threshold, 0.5);
        assert_eq!(config.field_weights.get(Field::Email), 0.4);
        assert_eq!(config.abbreviation("st"), Some("street"));
        assert_eq!(config.address_abbreviations.len(), 9);
        assert_eq!(config.random_seed, 42);
    }

    #[test]
    fn test_weight_normalization() {
        let mut config = MatchConfig::default();
        config.field_weights = FieldWeights {
            email: 2.0,
            name: 2.0,
            phone: 0.0,
            address: 0.0,
        };
        config.validate_and_normalize().unwrap();

        assert!((config.field_weights.sum() - 1.0).abs() < 1e-9);
        assert!((config.field_weights.email - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weights_near_one_left_alone() {
        let mut weights = FieldWeights {
            email: 0.4,
            name: 0.3,
            phone: 0.2,
            address: 0.1005,
        };
        weights.validate_and_normalize().unwrap();
        assert_eq!(weights.address, 0.1005);

        let mut weights = FieldWeights {
            email: 2.0,
            name: 1.0,
            phone: 1.0,
            address: 0.0,
        };
        weights.validate_and_normalize().unwrap();
        assert_eq!(weights.email, 0.5);
        assert_eq!(weights.name, 0.25);
    }

    #[test]
    fn test_abbreviations_keep_file_order() {
        let config: MatchConfig = serde_json::from_str(
            r#"{"address_abbreviations": {"st": "street", "apt": "apartment", "ave": "avenue"}}"#,
        )
        .unwrap();
        let keys: Vec<&str> = config
            .address_abbreviations
            .iter()
            .map(|(abbr, _)| abbr.as_str())
            .collect();
        assert_eq!(keys, ["st", "apt", "ave"]);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["address_abbreviations"]["apt"], "apartment");

        let default_config = MatchConfig::default();
        let defaults: Vec<&str> = default_config
            .address_abbreviations
            .iter()
            .map(|(abbr, _)| abbr.as_str())
            .take(3)
            .collect();
        assert_eq!(defaults, ["st", "ave", "rd"]);
    }

    #[test]
    fn test_negative_weight_error() {
        let mut config = MatchConfig::default();
        config.field_weights.phone = -0.1;
        assert!(matches!(
            config.validate_and_normalize(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_weights_error() {
        let mut config = MatchConfig::default();
        config.field_weights = FieldWeights {
            email: 0.0,
            name: 0.0,
            phone: 0.0,
            address: 0.0,
        };
        assert!(config.validate_and_normalize().is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = MatchConfig::default();
        config.rule_threshold = 1.5;
        assert!(config.validate_and_normalize().is_err());

        let mut config = MatchConfig::default();
        config.test_split_fraction = 1.0;
        assert!(config.validate_and_normalize().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"rule_threshold": 0.8, "classifier": "logistic_regression"}}"#).unwrap();

        let config = MatchConfig::from_path(file.path()).unwrap();
        assert_eq!(config.rule_threshold, 0.8);
        assert_eq!(config.classifier, "logistic_regression");
        assert_eq!(config.ml_threshold, 0.5);
        assert_eq!(config.forest.n_estimators, 100);
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            MatchConfig::from_path(file.path()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
