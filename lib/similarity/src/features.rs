//! Pairwise feature extraction for the statistical matcher

use crate::distance::{jaro_winkler, levenshtein_ratio, phonetic_similarity, sequence_ratio};
use crate::normalize::{
    email_domain, extract_email_local_part, normalize_name, normalize_phone, AddressStandardizer,
};
use idmatch_core::{IdentityRecord, MatchConfig, Result};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 20;

/// Feature names in vector order. Persisted with every model and checked on
/// load, so reordering this list invalidates saved models.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "email_sim",
    "name_sim",
    "phonetic_sim",
    "phone_sim",
    "address_sim",
    "email_exact",
    "name_exact",
    "phone_exact",
    "address_exact",
    "email_has_numbers1",
    "email_has_numbers2",
    "email_numbers_diff",
    "email_edit_dist",
    "name_edit_dist",
    "address_edit_dist",
    "email_len_diff",
    "name_len_diff",
    "email_lev_ratio",
    "name_lev_ratio",
    "domain_match",
];

/// Feature names as owned strings, the form stored in model artifacts
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}

/// Similarity features of one record pair, in [`FEATURE_NAMES`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Pair every value with its feature name
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Normalized views of one record used by the extractor
struct NormalizedFields<'a> {
    raw_email: &'a str,
    email: String,
    name: String,
    phone: String,
    address: String,
}

/// Turns a record pair into a [`FeatureVector`]
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    standardizer: AddressStandardizer,
}

impl FeatureExtractor {
    pub fn new(config: &MatchConfig) -> Result<Self> {
        Ok(Self {
            standardizer: AddressStandardizer::new(&config.address_abbreviations)?,
        })
    }

    pub fn extract(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> FeatureVector {
        let a = self.normalize(record1);
        let b = self.normalize(record2);

        let email_sim = guarded(&a.email, &b.email, sequence_ratio);
        let name_sim = guarded(&a.name, &b.name, jaro_winkler);
        let phonetic_sim = phonetic_similarity(&a.name, &b.name);
        let phone_sim = indicator(a.phone == b.phone);
        let address_sim = guarded(&a.address, &b.address, sequence_ratio);

        let email_has_numbers1 = indicator(has_digit(a.raw_email));
        let email_has_numbers2 = indicator(has_digit(b.raw_email));

        let domain1 = email_domain(a.raw_email);
        let domain2 = email_domain(b.raw_email);

        FeatureVector([
            email_sim,
            name_sim,
            phonetic_sim,
            phone_sim,
            address_sim,
            indicator(a.email == b.email),
            indicator(a.name == b.name),
            indicator(a.phone == b.phone),
            indicator(a.address == b.address),
            email_has_numbers1,
            email_has_numbers2,
            (email_has_numbers1 - email_has_numbers2).abs(),
            1.0 - email_sim,
            1.0 - name_sim,
            1.0 - address_sim,
            length_difference(&a.email, &b.email),
            length_difference(&a.name, &b.name),
            levenshtein_ratio(&a.email, &b.email),
            levenshtein_ratio(&a.name, &b.name),
            indicator(!domain1.is_empty() && domain1 == domain2),
        ])
    }

    fn normalize<'a>(&self, record: &'a IdentityRecord) -> NormalizedFields<'a> {
        NormalizedFields {
            raw_email: record.email_str(),
            email: extract_email_local_part(record.email_str()),
            name: normalize_name(record.name_str()),
            phone: normalize_phone(record.phone_str()).0,
            address: self
                .standardizer
                .standardize(record.address_str())
                .trim()
                .to_string(),
        }
    }
}

/// Apply `metric` when both values are present; both empty is 1.0, one
/// empty is 0.0
fn guarded(a: &str, b: &str, metric: fn(&str, &str) -> f64) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (false, false) => metric(a, b),
        _ => 0.0,
    }
}

#[inline]
fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

fn length_difference(a: &str, b: &str) -> f64 {
    let len1 = a.chars().count();
    let len2 = b.chars().count();
    len1.abs_diff(len2) as f64 / len1.max(len2).max(1) as f64
}
