//! # idmatch Core
//!
//! Core types shared by every idmatch crate.
//!
//! - [`IdentityRecord`] - A partial name / email / phone / address record
//! - [`SimilarityResult`] - The outcome of one matcher on one record pair
//! - [`MatchConfig`] - Weights, thresholds and training parameters
//! - [`Error`] - The error type for every fallible operation
//!
//! ## Example
//!
//! ```rust
//! use idmatch_core::{IdentityRecord, MatchConfig};
//!
//! let record = IdentityRecord::new()
//!     .with_name("John Doe")
//!     .with_email("john.doe@gmail.com");
//! assert_eq!(record.phone_str(), "");
//!
//! let mut config = MatchConfig::default();
//! config.validate_and_normalize().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod result;

pub use config::{FieldWeights, ForestParams, LogisticParams, MatchConfig};
pub use error::{Error, Result};
pub use record::{Field, IdentityRecord};
pub use result::{ComparisonReport, MatchMethod, SimilarityResult};
