//! Explanations attached to rule-based results
//!
//! Each field comparator returns its score together with a typed account of
//! how it was reached. The aggregate serializes these under
//! `details.field_similarities`.

use crate::distance::StringSimilarity;
use idmatch_core::FieldWeights;
use serde::Serialize;

/// A field score and the reasoning behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldScore<D> {
    pub score: f64,
    pub details: D,
}

impl<D> FieldScore<D> {
    pub fn new(score: f64, details: D) -> Self {
        Self { score, details }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmailDetails {
    BothEmpty,
    OneEmpty,
    ExactMatch,
    FuzzyMatch {
        similarities: StringSimilarity,
        pattern_boost: f64,
    },
}

/// Signals combined into a name score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameBreakdown {
    pub string_similarities: StringSimilarity,
    pub phonetic_similarity: f64,
    pub reversed_similarity: f64,
    pub nickname_boost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NameDetails {
    BothEmpty,
    OneEmpty,
    BothEmptyAfterNorm,
    OneEmptyAfterNorm,
    /// Uncapped score above 0.8
    ComplexMatch(NameBreakdown),
    LowSimilarity(NameBreakdown),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhoneDetails {
    BothEmpty,
    OneEmpty,
    ExactMatch { country_match: bool },
    PartialMatch { match_type: &'static str },
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressDetails {
    BothEmpty,
    OneEmpty,
    ParsedMatch {
        component_score: f64,
        string_similarity: f64,
    },
    StringMatch { similarities: StringSimilarity },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSimilarities {
    pub email: FieldScore<EmailDetails>,
    pub name: FieldScore<NameDetails>,
    pub phone: FieldScore<PhoneDetails>,
    pub address: FieldScore<AddressDetails>,
}

/// Everything a rule-based result records under `details`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleExplanation {
    pub field_similarities: FieldSimilarities,
    pub weights_used: FieldWeights,
}
