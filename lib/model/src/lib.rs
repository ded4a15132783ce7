//! # idmatch Model
//!
//! The learned side of idmatch and the engine that runs both matchers.
//!
//! - [`synthetic`] - Seeded generator of labelled record pairs
//! - [`forest`] / [`logistic`] - The two supported classifiers
//! - [`trainer`] - Training, evaluation and model artifacts
//! - [`ml`] - [`MlMatcher`], the learned [`IdentityMatcher`](idmatch_similarity::IdentityMatcher)
//! - [`engine`] - [`MatchEngine`], rule-based and learned results side by side

pub mod classifier;
pub mod engine;
pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod ml;
pub mod scaler;
pub mod synthetic;
pub mod trainer;

pub use classifier::{Classifier, ClassifierKind};
pub use engine::{BatchSummary, MatchEngine, Matcher};
pub use metrics::{ClassMetrics, ClassificationReport};
pub use ml::MlMatcher;
pub use scaler::StandardScaler;
pub use synthetic::{Dataset, LabeledPair, SyntheticDataGenerator, VariationKind};
pub use trainer::{EvaluationReport, TrainedModel, Trainer, TrainingOutcome};
