//! Comparison results
//!
//! Every matcher produces a [`SimilarityResult`]. Results are built fresh per
//! comparison and never mutated afterwards.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which matcher produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    RuleBased,
    MlBased,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::RuleBased => "rule_based",
            MatchMethod::MlBased => "ml_based",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing two identity records with one method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Aggregate similarity (or match probability) in [0.0, 1.0]
    pub similarity_score: f64,
    pub is_same_person: bool,
    pub method: MatchMethod,
    /// Heuristic confidence in [0.0, 1.0], not a calibrated probability
    pub confidence: f64,
    /// Structured explanation of how the score was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl SimilarityResult {
    /// Zero-score result carrying the failure text under `details.error`
    pub fn failed(method: MatchMethod, error: impl std::fmt::Display) -> Self {
        Self {
            similarity_score: 0.0,
            is_same_person: false,
            method,
            confidence: 0.0,
            details: Some(serde_json::json!({ "error": error.to_string() })),
        }
    }

    /// Error text if this result records a failure
    pub fn error(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get("error"))
            .and_then(Value::as_str)
    }
}

/// Combined output of both matchers for one record pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub rule_based: SimilarityResult,
    pub ml_based: SimilarityResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = SimilarityResult::failed(MatchMethod::MlBased, "boom");
        assert_eq!(result.similarity_score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_same_person);
        assert_eq!(result.error(), Some("boom"));
    }

    #[test]
    fn test_wire_format() {
        let result = SimilarityResult {
            similarity_score: 0.9,
            is_same_person: true,
            method: MatchMethod::RuleBased,
            confidence: 0.93,
            details: None,
        };
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["method"], "rule_based");
        assert_eq!(json["is_same_person"], true);
        assert!(json.get("similarity_score").is_some());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_report_nesting() {
        let report = ComparisonReport {
            rule_based: SimilarityResult::failed(MatchMethod::RuleBased, "a"),
            ml_based: SimilarityResult::failed(MatchMethod::MlBased, "b"),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rule_based"]["method"], "rule_based");
        assert_eq!(json["ml_based"]["details"]["error"], "b");
    }
}
