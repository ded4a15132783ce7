//! # idmatch Similarity
//!
//! Field normalization, similarity metrics and the rule-based identity
//! matcher.
//!
//! ## Features
//!
//! - **Normalization**: email local parts, names, NANP phone numbers and
//!   address abbreviations
//! - **Metric ensemble**: Jaro-Winkler, Levenshtein ratio, Ratcliff/Obershelp
//!   and exact match, plus Soundex agreement
//! - **Rule-based matching**: weighted per-field scores with typed
//!   explanations
//! - **Feature extraction**: the 20-value vector consumed by the statistical
//!   matcher
//!
//! ## Example
//!
//! ```rust
//! use idmatch_core::{IdentityRecord, MatchConfig};
//! use idmatch_similarity::RuleBasedMatcher;
//! use std::sync::Arc;
//!
//! let matcher = RuleBasedMatcher::new(Arc::new(MatchConfig::default())).unwrap();
//!
//! let a = IdentityRecord::new().with_email("john.doe@gmail.com").with_phone("555-123-4567");
//! let b = IdentityRecord::new().with_email("johndoe123@gmail.com").with_phone("5551234567");
//!
//! let result = matcher.compute_similarity(&a, &b);
//! assert!(result.is_same_person);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐
//! │  Normalize  │────>│  Distance   │────>│ RuleBasedMatcher│
//! │ (+ address) │     │ (ensemble)  │     │ (weighted sum)  │
//! └─────────────┘     └─────────────┘     └─────────────────┘
//!                            │
//!                     ┌─────────────┐
//!                     │  Features   │──> statistical matcher
//!                     └─────────────┘
//! ```

pub mod address;
pub mod distance;
pub mod explain;
pub mod features;
pub mod matcher;
pub mod normalize;
pub mod rule;

pub use address::{parse_address_components, AddressComponents, ComponentKind};
pub use distance::{phonetic_similarity, string_similarity, StringSimilarity};
pub use explain::FieldScore;
pub use features::{feature_names, FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use matcher::IdentityMatcher;
pub use normalize::{extract_email_local_part, normalize_phone, AddressStandardizer};
pub use rule::RuleBasedMatcher;
