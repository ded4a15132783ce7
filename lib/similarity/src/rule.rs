//! Rule-based identity matcher
//!
//! Scores each field with a hand-tuned comparator and combines the field
//! scores with the configured weights. Deterministic and stateless apart
//! from the shared configuration.

use crate::address::{component_agreement, parse_address_components};
use crate::distance::{jaro_winkler, phonetic_similarity, string_similarity};
use crate::explain::{
    AddressDetails, EmailDetails, FieldScore, FieldSimilarities, NameBreakdown, NameDetails,
    PhoneDetails, RuleExplanation,
};
use crate::matcher::IdentityMatcher;
use crate::normalize::{extract_email_local_part, normalize_name, normalize_phone, AddressStandardizer};
use ahash::AHashMap;
use idmatch_core::{Error, IdentityRecord, MatchConfig, MatchMethod, Result, SimilarityResult};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::sync::Arc;

/// Boost given to fuzzy email matches when either address carries digits
const EMAIL_DIGIT_BOOST: f64 = 0.3;
const NICKNAME_BOOST: f64 = 0.5;
const COMPLEX_NAME_MATCH: f64 = 0.8;
const PARTIAL_PHONE_SCORE: f64 = 0.8;
const PHONE_SUFFIX_LEN: usize = 7;
const CONFIDENCE_LIFT: f64 = 0.3;

/// Nickname -> formal given name
static NICKNAMES: Lazy<AHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("bob", "robert"),
        ("bobby", "robert"),
        ("rob", "robert"),
        ("robbie", "robert"),
        ("bill", "william"),
        ("billy", "william"),
        ("will", "william"),
        ("willy", "william"),
        ("jim", "james"),
        ("jimmy", "james"),
        ("jamie", "james"),
        ("joe", "joseph"),
        ("joey", "joseph"),
        ("mike", "michael"),
        ("mikey", "michael"),
        ("mick", "michael"),
        ("tom", "thomas"),
        ("tommy", "thomas"),
        ("dick", "richard"),
        ("rick", "richard"),
        ("rich", "richard"),
        ("dave", "david"),
        ("steve", "steven"),
        ("dan", "daniel"),
        ("danny", "daniel"),
        ("chris", "christopher"),
        ("tony", "anthony"),
        ("matt", "matthew"),
        ("nick", "nicholas"),
        ("ed", "edward"),
        ("ted", "edward"),
        ("liz", "elizabeth"),
        ("beth", "elizabeth"),
        ("betty", "elizabeth"),
        ("kate", "katherine"),
        ("katie", "katherine"),
        ("kathy", "katherine"),
        ("peggy", "margaret"),
        ("maggie", "margaret"),
        ("jenny", "jennifer"),
        ("jen", "jennifer"),
        ("sue", "susan"),
        ("patty", "patricia"),
        ("pat", "patricia"),
    ]
    .into_iter()
    .collect()
});

/// Deterministic weighted-field matcher
#[derive(Debug, Clone)]
pub struct RuleBasedMatcher {
    config: Arc<MatchConfig>,
    standardizer: AddressStandardizer,
}

impl RuleBasedMatcher {
    pub fn new(config: Arc<MatchConfig>) -> Result<Self> {
        let standardizer = AddressStandardizer::new(&config.address_abbreviations)?;
        Ok(Self {
            config,
            standardizer,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Compare two records
    ///
    /// Never fails: an internal error yields a zero-score result whose
    /// details carry the error text.
    pub fn compute_similarity(
        &self,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> SimilarityResult {
        match self.try_compute(record1, record2) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error computing similarity: {}", e);
                SimilarityResult::failed(MatchMethod::RuleBased, e)
            }
        }
    }

    fn try_compute(
        &self,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> Result<SimilarityResult> {
        let field_similarities = FieldSimilarities {
            email: email_similarity(record1.email_str(), record2.email_str()),
            name: name_similarity(record1.name_str(), record2.name_str()),
            phone: phone_similarity(record1.phone_str(), record2.phone_str()),
            address: self.address_similarity(record1.address_str(), record2.address_str()),
        };

        let weights = self.config.field_weights;
        let weighted = weights.email * field_similarities.email.score
            + weights.name * field_similarities.name.score
            + weights.phone * field_similarities.phone.score
            + weights.address * field_similarities.address.score;

        if !weighted.is_finite() {
            return Err(Error::Computation(format!(
                "aggregate similarity is not finite ({})",
                weighted
            )));
        }

        let similarity = weighted.clamp(0.0, 1.0);
        let is_same_person = similarity >= self.config.rule_threshold;
        let confidence = (similarity + (1.0 - similarity) * CONFIDENCE_LIFT).min(1.0);

        tracing::debug!(
            "Rule-based similarity {:.4} (email {:.3}, name {:.3}, phone {:.3}, address {:.3})",
            similarity,
            field_similarities.email.score,
            field_similarities.name.score,
            field_similarities.phone.score,
            field_similarities.address.score
        );

        let details = serde_json::to_value(RuleExplanation {
            field_similarities,
            weights_used: weights,
        })?;

        Ok(SimilarityResult {
            similarity_score: similarity,
            is_same_person,
            method: MatchMethod::RuleBased,
            confidence,
            details: Some(details),
        })
    }

    /// Standardized-text similarity, averaged with component agreement when
    /// both raw addresses parse
    pub fn address_similarity(&self, address1: &str, address2: &str) -> FieldScore<AddressDetails> {
        match (address1.trim().is_empty(), address2.trim().is_empty()) {
            (true, true) => return FieldScore::new(1.0, AddressDetails::BothEmpty),
            (true, false) | (false, true) => return FieldScore::new(0.0, AddressDetails::OneEmpty),
            _ => {}
        }

        let standardized1 = self.standardizer.standardize(address1);
        let standardized2 = self.standardizer.standardize(address2);
        let similarities = string_similarity(&standardized1, &standardized2);
        let best = similarities.max();

        let parsed1 = parse_address_components(address1);
        let parsed2 = parse_address_components(address2);
        if !parsed1.is_empty() && !parsed2.is_empty() {
            if let Some(component_score) = component_agreement(&parsed1, &parsed2) {
                return FieldScore::new(
                    ((best + component_score) / 2.0).min(1.0),
                    AddressDetails::ParsedMatch {
                        component_score,
                        string_similarity: best,
                    },
                );
            }
        }

        FieldScore::new(best, AddressDetails::StringMatch { similarities })
    }
}

impl IdentityMatcher for RuleBasedMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::RuleBased
    }

    fn compare(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> SimilarityResult {
        self.compute_similarity(record1, record2)
    }
}

/// Compare the stable cores of two email local parts
pub fn email_similarity(email1: &str, email2: &str) -> FieldScore<EmailDetails> {
    let local1 = extract_email_local_part(email1);
    let local2 = extract_email_local_part(email2);

    match (local1.is_empty(), local2.is_empty()) {
        (true, true) => return FieldScore::new(1.0, EmailDetails::BothEmpty),
        (true, false) | (false, true) => return FieldScore::new(0.0, EmailDetails::OneEmpty),
        _ => {}
    }

    if local1 == local2 {
        return FieldScore::new(1.0, EmailDetails::ExactMatch);
    }

    let similarities = string_similarity(&local1, &local2);
    let has_digit = |s: &str| s.chars().any(|c| c.is_ascii_digit());
    let pattern_boost = if has_digit(email1) || has_digit(email2) {
        EMAIL_DIGIT_BOOST
    } else {
        0.0
    };

    let score = similarities.max() * 0.7 + pattern_boost * 0.3;
    FieldScore::new(
        score.min(1.0),
        EmailDetails::FuzzyMatch {
            similarities,
            pattern_boost,
        },
    )
}

/// Compare two personal names
///
/// Combines the string ensemble, Soundex agreement, a first/last swap check
/// and nickname canonicalization. The inputs are put in a fixed order first,
/// so the score does not depend on which record comes first.
pub fn name_similarity(name1: &str, name2: &str) -> FieldScore<NameDetails> {
    match (name1.trim().is_empty(), name2.trim().is_empty()) {
        (true, true) => return FieldScore::new(1.0, NameDetails::BothEmpty),
        (true, false) | (false, true) => return FieldScore::new(0.0, NameDetails::OneEmpty),
        _ => {}
    }

    let norm1 = normalize_name(name1);
    let norm2 = normalize_name(name2);
    match (norm1.is_empty(), norm2.is_empty()) {
        (true, true) => return FieldScore::new(1.0, NameDetails::BothEmptyAfterNorm),
        (true, false) | (false, true) => {
            return FieldScore::new(0.0, NameDetails::OneEmptyAfterNorm)
        }
        _ => {}
    }

    let (first, second) = if norm1 <= norm2 {
        (norm1.as_str(), norm2.as_str())
    } else {
        (norm2.as_str(), norm1.as_str())
    };

    let string_similarities = string_similarity(first, second);
    let phonetic = phonetic_similarity(first, second);
    let reversed = reversed_name_similarity(first, second);
    let nickname_boost = if first != second && canonical_tokens(first) == canonical_tokens(second)
    {
        NICKNAME_BOOST
    } else {
        0.0
    };

    let score = string_similarities.max().max(phonetic).max(reversed) + nickname_boost;
    let breakdown = NameBreakdown {
        string_similarities,
        phonetic_similarity: phonetic,
        reversed_similarity: reversed,
        nickname_boost,
    };
    let details = if score > COMPLEX_NAME_MATCH {
        NameDetails::ComplexMatch(breakdown)
    } else {
        NameDetails::LowSimilarity(breakdown)
    };

    FieldScore::new(score.min(1.0), details)
}

/// Jaro-Winkler of "last first" against the other name, when both names
/// have exactly two tokens
fn reversed_name_similarity(name1: &str, name2: &str) -> f64 {
    let parts1: SmallVec<[&str; 4]> = name1.split_whitespace().collect();
    let parts2: SmallVec<[&str; 4]> = name2.split_whitespace().collect();
    if parts1.len() != 2 || parts2.len() != 2 {
        return 0.0;
    }
    let reversed1 = format!("{} {}", parts1[1], parts1[0]);
    jaro_winkler(&reversed1, name2)
}

fn canonical_tokens(name: &str) -> SmallVec<[&str; 4]> {
    name.split_whitespace()
        .map(|token| NICKNAMES.get(token).copied().unwrap_or(token))
        .collect()
}

/// Compare canonical phone numbers, falling back to the last seven digits
pub fn phone_similarity(phone1: &str, phone2: &str) -> FieldScore<PhoneDetails> {
    match (phone1.trim().is_empty(), phone2.trim().is_empty()) {
        (true, true) => return FieldScore::new(1.0, PhoneDetails::BothEmpty),
        (true, false) | (false, true) => return FieldScore::new(0.0, PhoneDetails::OneEmpty),
        _ => {}
    }

    let (canonical1, region1) = normalize_phone(phone1);
    let (canonical2, region2) = normalize_phone(phone2);

    if canonical1 == canonical2 {
        return FieldScore::new(
            1.0,
            PhoneDetails::ExactMatch {
                country_match: region1 == region2,
            },
        );
    }

    if let (Some(tail1), Some(tail2)) = (
        last_digits(&canonical1, PHONE_SUFFIX_LEN),
        last_digits(&canonical2, PHONE_SUFFIX_LEN),
    ) {
        if tail1 == tail2 {
            return FieldScore::new(
                PARTIAL_PHONE_SCORE,
                PhoneDetails::PartialMatch {
                    match_type: "last_7_digits",
                },
            );
        }
    }

    FieldScore::new(0.0, PhoneDetails::NoMatch)
}

/// The last `n` ASCII digits of `s`, if it carries at least that many
fn last_digits(s: &str, n: usize) -> Option<String> {
    let digits: SmallVec<[u8; 16]> = s.bytes().filter(u8::is_ascii_digit).collect();
    if digits.len() < n {
        return None;
    }
    Some(digits[digits.len() - n..].iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RuleBasedMatcher {
        RuleBasedMatcher::new(Arc::new(MatchConfig::default())).unwrap()
    }

    fn full_record() -> IdentityRecord {
        IdentityRecord::new()
            .with_name("Jane Q. Public")
            .with_email("jane.public@example.com")
            .with_phone("(555) 987-6543")
            .with_address("42 Elm Ave, Springfield, IL 62704")
    }

    fn field_score(result: &SimilarityResult, field: &str) -> f64 {
        result.details.as_ref().unwrap()["field_similarities"][field]["score"]
            .as_f64()
            .unwrap()
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(email_similarity("", "").score, 1.0);
        assert_eq!(email_similarity("a@x.com", "").score, 0.0);
        assert_eq!(email_similarity("no-at", "a@x.com").score, 0.0);
        let exact = email_similarity("john.doe@gmail.com", "johndoe123@gmail.com");
        assert_eq!(exact.score, 1.0);
        assert_eq!(exact.details, EmailDetails::ExactMatch);
    }

    #[test]
    fn test_email_digit_boost() {
        let plain = email_similarity("jon@x.com", "john@x.com");
        let boosted = email_similarity("jon7x@x.com", "john@x.com");
        match (&plain.details, &boosted.details) {
            (
                EmailDetails::FuzzyMatch { pattern_boost: a, .. },
                EmailDetails::FuzzyMatch { pattern_boost: b, .. },
            ) => {
                assert_eq!(*a, 0.0);
                assert_eq!(*b, 0.3);
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert!(plain.score <= 0.7);
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(name_similarity("", "").score, 1.0);
        assert_eq!(name_similarity("John", "").score, 0.0);
        assert_eq!(name_similarity("...", "!!").score, 1.0);
        assert_eq!(name_similarity("...", "John").score, 0.0);
        assert_eq!(name_similarity("John Smith", "john smith").score, 1.0);
    }

    #[test]
    fn test_nickname_boost() {
        let score = name_similarity("Bob Smith", "Robert Smith");
        let NameDetails::ComplexMatch(breakdown) = &score.details else {
            panic!("expected complex match, got {:?}", score.details);
        };
        assert_eq!(breakdown.nickname_boost, 0.5);
        assert_eq!(score.score, 1.0);

        let single = name_similarity("Bill", "William");
        assert_eq!(single.score, 1.0);
    }

    #[test]
    fn test_reversed_names() {
        let score = name_similarity("Smith John", "John Smith");
        assert_eq!(score.score, 1.0);
        assert!(matches!(score.details, NameDetails::ComplexMatch(_)));
    }

    #[test]
    fn test_name_symmetry() {
        for (a, b) in [
            ("Jon Smyth", "John Smith"),
            ("Katherine Lee", "Kate Li"),
            ("Ann", "Annabelle"),
            ("Smith, John", "Jonathan Smith-Jones"),
        ] {
            assert_eq!(name_similarity(a, b).score, name_similarity(b, a).score, "{} / {}", a, b);
        }
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(phone_similarity("", "").score, 1.0);
        assert_eq!(phone_similarity("555-123-4567", "").score, 0.0);

        let exact = phone_similarity("555-123-4567", "5551234567");
        assert_eq!(exact.score, 1.0);
        assert_eq!(exact.details, PhoneDetails::ExactMatch { country_match: true });

        let partial = phone_similarity("555-123-4567", "666-123-4567");
        assert_eq!(partial.score, 0.8);

        assert_eq!(phone_similarity("555-123-4567", "555-765-4321").score, 0.0);
        assert_eq!(phone_similarity("abc", "xyz").score, 0.0);
    }

    #[test]
    fn test_phone_partial_uses_digits_only() {
        // Unparseable local number still shares the subscriber digits
        let local = phone_similarity("123-4567", "(555) 123-4567");
        assert_eq!(local.score, 0.8);
        assert_eq!(
            local.details,
            PhoneDetails::PartialMatch {
                match_type: "last_7_digits"
            }
        );

        // Fewer than seven digits never matches partially
        assert_eq!(phone_similarity("12-34", "(555) 123-4567").score, 0.0);
        assert_eq!(phone_similarity("x4567", "555-4567").score, 0.0);
    }

    #[test]
    fn test_address_rules() {
        let m = matcher();
        assert_eq!(m.address_similarity("", "").score, 1.0);
        assert_eq!(m.address_similarity("1 Main St", "  ").score, 0.0);

        // Text agrees once standardized, the raw street types still differ
        let same = m.address_similarity("123 Main Street, Anytown, USA", "123 Main St, Anytown, USA");
        match same.details {
            AddressDetails::ParsedMatch {
                component_score,
                string_similarity,
            } => {
                assert_eq!(component_score, 0.75);
                assert_eq!(string_similarity, 1.0);
            }
            ref other => panic!("unexpected details {:?}", other),
        }
        assert!((same.score - 0.875).abs() < 1e-12);

        let identical = m.address_similarity("42 Oak Avenue, Springfield", "42 oak avenue, springfield");
        assert_eq!(identical.score, 1.0);

        let moved = m.address_similarity("123 Main St, Anytown", "123 Main St, Othertown");
        match moved.details {
            AddressDetails::ParsedMatch { component_score, .. } => {
                assert_eq!(component_score, 0.75)
            }
            other => panic!("unexpected details {:?}", other),
        }
        assert!(moved.score < 1.0);
    }

    #[test]
    fn test_self_comparison() {
        let m = matcher();
        let record = full_record();
        let result = m.compute_similarity(&record, &record);

        assert!((result.similarity_score - 1.0).abs() < 1e-9);
        assert!(result.is_same_person);
        for field in ["email", "name", "phone", "address"] {
            assert_eq!(field_score(&result, field), 1.0, "{}", field);
        }
    }

    #[test]
    fn test_empty_records_match() {
        let m = matcher();
        let empty = IdentityRecord::new();
        let result = m.compute_similarity(&empty, &empty);
        assert!((result.similarity_score - 1.0).abs() < 1e-9);
        assert!(result.is_same_person);
    }

    #[test]
    fn test_result_shape() {
        let m = matcher();
        let result = m.compute_similarity(&full_record(), &IdentityRecord::new());
        let details = result.details.as_ref().unwrap();

        assert_eq!(result.method, MatchMethod::RuleBased);
        assert_eq!(result.similarity_score, 0.0);
        assert!(!result.is_same_person);
        assert!((result.confidence - 0.3).abs() < 1e-9);
        assert_eq!(details["weights_used"]["email"], 0.4);
        assert_eq!(details["field_similarities"]["name"]["details"]["type"], "one_empty");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut config = MatchConfig::default();
        config.field_weights = idmatch_core::FieldWeights {
            email: 1.0,
            name: 0.0,
            phone: 0.0,
            address: 0.0,
        };
        config.rule_threshold = 1.0;
        let m = RuleBasedMatcher::new(Arc::new(config)).unwrap();

        let a = IdentityRecord::new().with_email("john.doe@gmail.com");
        let b = IdentityRecord::new().with_email("johndoe@yahoo.com");
        let result = m.compute_similarity(&a, &b);
        assert_eq!(result.similarity_score, 1.0);
        assert!(result.is_same_person);
    }

    #[test]
    fn test_non_finite_weights_become_failed_result() {
        let mut config = MatchConfig::default();
        config.field_weights.email = f64::NAN;
        let m = RuleBasedMatcher::new(Arc::new(config)).unwrap();

        let record = full_record();
        let result = m.compute_similarity(&record, &record);
        assert_eq!(result.similarity_score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_same_person);
        assert!(result.error().unwrap().contains("not finite"));
    }

    #[test]
    fn test_last_digits() {
        assert_eq!(last_digits("+15551234567", 7).as_deref(), Some("1234567"));
        assert_eq!(last_digits("(555) 123-4567", 7).as_deref(), Some("1234567"));
        assert_eq!(last_digits("12345", 7), None);
        assert_eq!(last_digits("ünï 12 cödé 34", 3).as_deref(), Some("234"));
    }
}
