//! Runs the rule-based and learned matchers side by side

use crate::ml::MlMatcher;
use crate::trainer::{EvaluationReport, TrainedModel};
use idmatch_core::{
    ComparisonReport, Error, IdentityRecord, MatchConfig, MatchMethod, Result, SimilarityResult,
};
use idmatch_similarity::{IdentityMatcher, RuleBasedMatcher};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One of the two matchers, borrowed from a [`MatchEngine`]
#[derive(Debug, Clone, Copy)]
pub enum Matcher<'a> {
    RuleBased(&'a RuleBasedMatcher),
    Ml(&'a MlMatcher),
}

impl IdentityMatcher for Matcher<'_> {
    fn method(&self) -> MatchMethod {
        match self {
            Matcher::RuleBased(m) => m.method(),
            Matcher::Ml(m) => m.method(),
        }
    }

    fn compare(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> SimilarityResult {
        match self {
            Matcher::RuleBased(m) => m.compare(record1, record2),
            Matcher::Ml(m) => m.compare(record1, record2),
        }
    }
}

/// Entry point for comparing records with both methods
///
/// When no model has been trained or loaded, the first comparison trains a
/// small fallback model (`fallback_sample_count` samples) and keeps it.
#[derive(Debug)]
pub struct MatchEngine {
    config: Arc<MatchConfig>,
    rule: RuleBasedMatcher,
    ml: MlMatcher,
}

impl MatchEngine {
    pub fn new(config: Arc<MatchConfig>) -> Result<Self> {
        Ok(Self {
            rule: RuleBasedMatcher::new(Arc::clone(&config))?,
            ml: MlMatcher::new(Arc::clone(&config))?,
            config,
        })
    }

    pub fn with_model(config: Arc<MatchConfig>, model: TrainedModel) -> Result<Self> {
        Ok(Self {
            rule: RuleBasedMatcher::new(Arc::clone(&config))?,
            ml: MlMatcher::with_model(Arc::clone(&config), model)?,
            config,
        })
    }

    /// Build an engine, loading the model at `model_path` when given
    ///
    /// A missing file is not an error: the engine falls back to training on
    /// demand. Any other load failure is returned.
    pub fn open(config: Arc<MatchConfig>, model_path: Option<&Path>) -> Result<Self> {
        let engine = Self::new(config)?;
        if let Some(path) = model_path {
            match engine.ml.load(path) {
                Ok(()) => {}
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(
                        "Model file {:?} not found, a fallback model will be trained on first use",
                        path
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn rule_matcher(&self) -> &RuleBasedMatcher {
        &self.rule
    }

    pub fn ml_matcher(&self) -> &MlMatcher {
        &self.ml
    }

    pub fn matcher(&self, method: MatchMethod) -> Matcher<'_> {
        match method {
            MatchMethod::RuleBased => Matcher::RuleBased(&self.rule),
            MatchMethod::MlBased => Matcher::Ml(&self.ml),
        }
    }

    /// Train the learned matcher with the configured sample count
    pub fn train(&self) -> Result<EvaluationReport> {
        self.ml.train(self.config.training_sample_count)
    }

    /// Make sure the learned matcher has a model, training the fallback if
    /// needed
    fn ensure_model(&self) -> Result<Arc<TrainedModel>> {
        self.ml.get_or_train(self.config.fallback_sample_count)
    }

    /// Run both matchers on one pair; `model_ready` is the outcome of
    /// [`MatchEngine::ensure_model`] for this call
    fn compare_pair(
        &self,
        model_ready: std::result::Result<(), &Error>,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> ComparisonReport {
        let rule_based = self.matcher(MatchMethod::RuleBased).compare(record1, record2);
        let ml_based = match model_ready {
            Ok(()) => self.matcher(MatchMethod::MlBased).compare(record1, record2),
            Err(e) => SimilarityResult::failed(MatchMethod::MlBased, e),
        };
        ComparisonReport {
            rule_based,
            ml_based,
        }
    }

    /// Compare one pair with a single method
    ///
    /// The learned method trains the fallback model if needed.
    pub fn compare_with(
        &self,
        method: MatchMethod,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> SimilarityResult {
        if method == MatchMethod::MlBased {
            if let Err(e) = self.ensure_model() {
                tracing::error!("ML matcher unavailable: {}", e);
                return SimilarityResult::failed(MatchMethod::MlBased, e);
            }
        }
        self.matcher(method).compare(record1, record2)
    }

    /// Compare one pair with both methods
    pub fn compare_records(
        &self,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> ComparisonReport {
        let model = self.ensure_model();
        if let Err(e) = &model {
            tracing::error!("ML matcher unavailable: {}", e);
        }
        self.compare_pair(model.as_ref().map(|_| ()), record1, record2)
    }

    /// Compare many pairs in parallel, preserving input order
    pub fn compare_batch(&self, pairs: &[(IdentityRecord, IdentityRecord)]) -> Vec<ComparisonReport> {
        let model = self.ensure_model();
        if let Err(e) = &model {
            tracing::error!("ML matcher unavailable for batch of {}: {}", pairs.len(), e);
        }
        let model_ready = model.as_ref().map(|_| ());

        let reports: Vec<ComparisonReport> = pairs
            .par_iter()
            .map(|(record1, record2)| self.compare_pair(model_ready, record1, record2))
            .collect();

        tracing::debug!("Compared {} pairs", reports.len());
        reports
    }

    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ml.save(path)
    }
}

/// Aggregate counts over a batch of comparisons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub rule_matches: usize,
    pub ml_matches: usize,
    /// Pairs where both methods reached the same decision
    pub agreements: usize,
    pub ml_failures: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[ComparisonReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            summary.total += 1;
            summary.rule_matches += report.rule_based.is_same_person as usize;
            summary.ml_matches += report.ml_based.is_same_person as usize;
            summary.agreements +=
                (report.rule_based.is_same_person == report.ml_based.is_same_person) as usize;
            summary.ml_failures += report.ml_based.error().is_some() as usize;
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<MatchConfig> {
        let mut config = MatchConfig::default();
        config.fallback_sample_count = 300;
        config.forest.n_estimators = 20;
        Arc::new(config)
    }

    fn demo_pair() -> (IdentityRecord, IdentityRecord) {
        (
            IdentityRecord::new()
                .with_name("John Doe")
                .with_email("john.doe@gmail.com")
                .with_phone("(555) 123-4567")
                .with_address("123 Main Street, Anytown, CA 90210"),
            IdentityRecord::new()
                .with_name("Jon Doe")
                .with_email("johndoe123@gmail.com")
                .with_phone("555-123-4567")
                .with_address("123 Main St, Anytown, CA 90210"),
        )
    }

    #[test]
    fn test_compare_records_demo_pair() {
        let engine = MatchEngine::new(config()).unwrap();
        let (a, b) = demo_pair();
        let report = engine.compare_records(&a, &b);

        assert_eq!(report.rule_based.method, MatchMethod::RuleBased);
        assert!(report.rule_based.similarity_score > 0.7);
        assert!(report.rule_based.is_same_person);

        assert_eq!(report.ml_based.method, MatchMethod::MlBased);
        assert!(report.ml_based.error().is_none(), "{:?}", report.ml_based.details);
        assert!(engine.ml_matcher().is_ready());
    }

    #[test]
    fn test_fallback_trained_once() {
        let engine = MatchEngine::new(config()).unwrap();
        let (a, b) = demo_pair();

        engine.compare_records(&a, &b);
        let first = engine.ml_matcher().model().unwrap();
        engine.compare_records(&b, &a);
        let second = engine.ml_matcher().model().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_batch_preserves_order() {
        let engine = MatchEngine::new(config()).unwrap();
        let (a, b) = demo_pair();
        let stranger = IdentityRecord::new().with_name("Zed Quill").with_email("zq@example.org");
        let pairs = vec![
            (a.clone(), b.clone()),
            (a.clone(), stranger.clone()),
            (a.clone(), a.clone()),
        ];

        let reports = engine.compare_batch(&pairs);
        assert_eq!(reports.len(), 3);
        for ((r1, r2), report) in pairs.iter().zip(&reports) {
            assert_eq!(report.rule_based, engine.rule_matcher().compute_similarity(r1, r2));
        }
        assert!(reports[0].rule_based.is_same_person);
        assert!(!reports[1].rule_based.is_same_person);
        assert_eq!(reports[2].rule_based.similarity_score, 1.0);

        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.rule_matches, 2);
        assert_eq!(summary.ml_failures, 0);
    }

    #[test]
    fn test_invalid_classifier_only_fails_ml() {
        let mut config = MatchConfig::default();
        config.classifier = "svm".to_string();
        let engine = MatchEngine::new(Arc::new(config)).unwrap();
        let (a, b) = demo_pair();

        let report = engine.compare_records(&a, &b);
        assert!(report.rule_based.error().is_none());
        assert!(report.rule_based.is_same_person);
        assert_eq!(report.ml_based.similarity_score, 0.0);
        assert!(report.ml_based.error().unwrap().contains("svm"));

        let ml = engine.compare_with(MatchMethod::MlBased, &a, &b);
        assert!(ml.error().is_some());
    }

    #[test]
    fn test_matcher_union() {
        let engine = MatchEngine::new(config()).unwrap();
        let (a, b) = demo_pair();
        assert_eq!(engine.matcher(MatchMethod::RuleBased).method(), MatchMethod::RuleBased);
        assert_eq!(engine.matcher(MatchMethod::MlBased).method(), MatchMethod::MlBased);

        let rule = engine.compare_with(MatchMethod::RuleBased, &a, &b);
        assert_eq!(rule, engine.rule_matcher().compute_similarity(&a, &b));
        // Rule comparisons never train a model
        assert!(!engine.ml_matcher().is_ready());
    }

    #[test]
    fn test_reports_match_direct_dispatch() {
        let engine = MatchEngine::new(config()).unwrap();
        let (a, b) = demo_pair();
        let report = engine.compare_records(&a, &b);

        for (method, from_report) in [
            (MatchMethod::RuleBased, &report.rule_based),
            (MatchMethod::MlBased, &report.ml_based),
        ] {
            let matcher = engine.matcher(method);
            let direct = matcher.compare(&a, &b);
            assert_eq!(direct.method, method);
            assert_eq!(&direct, from_report, "{:?}", method);
        }

        let batch = engine.compare_batch(&[(a.clone(), b.clone())]);
        assert_eq!(batch[0], report);
    }

    #[test]
    fn test_open_missing_model_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.idm");
        let engine = MatchEngine::open(config(), Some(&missing)).unwrap();
        assert!(!engine.ml_matcher().is_ready());

        let corrupt = dir.path().join("corrupt.idm");
        std::fs::write(&corrupt, b"not a model").unwrap();
        assert!(matches!(
            MatchEngine::open(config(), Some(&corrupt)),
            Err(Error::Persistence(_))
        ));
    }
}
