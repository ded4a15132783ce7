//! # idmatch
//!
//! Pairwise identity matching over partial, noisy person records.
//!
//! Two records (any subset of name, email, phone and address) are compared
//! by a deterministic weighted rule-based matcher and by a classifier trained
//! on synthetic record pairs. Both results are explainable.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! idmatch train --samples 10000 --save-model models/idmatch.idm
//! idmatch compare --model models/idmatch.idm \
//!     --record1 '{"name": "John Doe", "email": "john.doe@gmail.com"}' \
//!     --record2 '{"name": "Jon Doe", "email": "johndoe123@gmail.com"}'
//! idmatch serve --http-port 8080 --model models/idmatch.idm
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use idmatch::prelude::*;
//! use std::sync::Arc;
//!
//! let engine = MatchEngine::new(Arc::new(MatchConfig::default())).unwrap();
//! engine.train().unwrap();
//!
//! let a = IdentityRecord::new().with_name("John Doe").with_phone("(555) 123-4567");
//! let b = IdentityRecord::new().with_name("Jon Doe").with_phone("555-123-4567");
//! let report = engine.compare_records(&a, &b);
//! println!("rule: {:.3}, ml: {:.3}", report.rule_based.similarity_score, report.ml_based.similarity_score);
//! ```
//!
//! ## Crate Structure
//!
//! - `idmatch-core` - Records, results, configuration and errors
//! - `idmatch-similarity` - Normalization, similarity metrics, rule-based matching, features
//! - `idmatch-storage` - Model artifact files
//! - `idmatch-model` - Synthetic data, classifiers, training and the [`MatchEngine`]
//! - `idmatch-api` - REST endpoints

// Re-export core types
pub use idmatch_core::{
    ComparisonReport, Error, Field, FieldWeights, IdentityRecord, MatchConfig, MatchMethod,
    Result, SimilarityResult,
};

// Re-export matchers
pub use idmatch_similarity::{FeatureExtractor, FeatureVector, IdentityMatcher, RuleBasedMatcher};
pub use idmatch_model::{
    BatchSummary, ClassifierKind, EvaluationReport, MatchEngine, Matcher, MlMatcher,
    SyntheticDataGenerator, TrainedModel, Trainer,
};

// Re-export API
pub use idmatch_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ComparisonReport, Error, IdentityMatcher, IdentityRecord, MatchConfig, MatchEngine,
        MatchMethod, Result, SimilarityResult,
    };
}

/// Field normalizers
pub mod normalize {
    pub use idmatch_similarity::normalize::{
        extract_email_local_part, normalize_name, normalize_phone, AddressStandardizer,
    };
    pub use idmatch_similarity::parse_address_components;
}
