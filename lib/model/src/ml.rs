//! Learned matcher over the 20-feature comparison vector

use crate::trainer::{EvaluationReport, TrainedModel, Trainer};
use idmatch_core::{Error, IdentityRecord, MatchConfig, MatchMethod, Result, SimilarityResult};
use idmatch_similarity::IdentityMatcher;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Wraps a trainer and the currently active model
///
/// The model slot starts empty; it is filled by [`MlMatcher::train`],
/// [`MlMatcher::load`] or lazily by [`MlMatcher::get_or_train`].
pub struct MlMatcher {
    trainer: Trainer,
    model: RwLock<Option<Arc<TrainedModel>>>,
    /// Why the last fallback training failed; cleared by `train` and `load`
    fallback_failure: Mutex<Option<String>>,
}

impl MlMatcher {
    pub fn new(config: Arc<MatchConfig>) -> Result<Self> {
        Ok(Self {
            trainer: Trainer::new(config)?,
            model: RwLock::new(None),
            fallback_failure: Mutex::new(None),
        })
    }

    pub fn with_model(config: Arc<MatchConfig>, model: TrainedModel) -> Result<Self> {
        let matcher = Self::new(config)?;
        *matcher.model.write() = Some(Arc::new(model));
        Ok(matcher)
    }

    pub fn config(&self) -> &MatchConfig {
        self.trainer.config()
    }

    pub fn is_ready(&self) -> bool {
        self.model.read().is_some()
    }

    /// The active model, if any
    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().clone()
    }

    /// Train on `sample_count` synthetic pairs and activate the new model
    pub fn train(&self, sample_count: usize) -> Result<EvaluationReport> {
        let outcome = self.trainer.fit(sample_count)?;
        self.activate(outcome.model);
        Ok(outcome.report)
    }

    fn activate(&self, model: TrainedModel) {
        let mut slot = self.model.write();
        *slot = Some(Arc::new(model));
        self.fallback_failure.lock().take();
    }

    /// Return the active model, training one on `sample_count` pairs if
    /// none is present. Concurrent callers train at most once.
    ///
    /// A failed fallback training is remembered: later calls return the
    /// same failure without training again until a model is trained or
    /// loaded explicitly.
    pub fn get_or_train(&self, sample_count: usize) -> Result<Arc<TrainedModel>> {
        if let Some(model) = self.model.read().as_ref() {
            return Ok(Arc::clone(model));
        }

        let mut slot = self.model.write();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let mut failure = self.fallback_failure.lock();
        if let Some(reason) = failure.as_ref() {
            return Err(Error::Training(format!(
                "fallback model unavailable: {}",
                reason
            )));
        }

        tracing::warn!(
            "No trained model available, training fallback model on {} samples",
            sample_count
        );
        match self.trainer.fit(sample_count) {
            Ok(outcome) => {
                let model = Arc::new(outcome.model);
                *slot = Some(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                tracing::error!("Fallback training failed, not retrying: {}", e);
                *failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Reason the last fallback training failed, if it did
    pub fn fallback_failure(&self) -> Option<String> {
        self.fallback_failure.lock().clone()
    }

    fn ready_model(&self) -> Result<Arc<TrainedModel>> {
        self.model().ok_or(Error::ModelNotReady)
    }

    /// Match probability in [0.0, 1.0]
    pub fn predict(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> Result<f64> {
        let model = self.ready_model()?;
        Ok(self.trainer.predict(&model, record1, record2))
    }

    pub fn is_same_person(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> Result<bool> {
        Ok(self.predict(record1, record2)? >= self.config().ml_threshold)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.ready_model()?.save(path)?;
        tracing::info!("Model saved to {:?}", path);
        Ok(())
    }

    /// Replace the active model with the artifact at `path`
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let model = TrainedModel::load(path)?;
        self.activate(model);
        Ok(())
    }

    /// Score a pair with an explicit model
    pub fn compare_with_model(
        &self,
        model: &TrainedModel,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> SimilarityResult {
        let features = self.trainer.extractor().extract(record1, record2);
        let probability = model.predict_features(&features);

        let named: Map<String, Value> = features
            .named()
            .map(|(name, value)| (name.to_string(), Value::from(value)))
            .collect();
        let details = serde_json::json!({
            "model_kind": model.kind().as_str(),
            "features": named,
        });

        tracing::debug!("ML match probability {:.4}", probability);

        SimilarityResult {
            similarity_score: probability,
            is_same_person: probability >= self.config().ml_threshold,
            method: MatchMethod::MlBased,
            confidence: probability,
            details: Some(details),
        }
    }
}

impl std::fmt::Debug for MlMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlMatcher")
            .field("ready", &self.is_ready())
            .field("kind", &self.model().map(|m| m.kind()))
            .finish()
    }
}

impl IdentityMatcher for MlMatcher {
    fn method(&self) -> MatchMethod {
        MatchMethod::MlBased
    }

    fn compare(&self, record1: &IdentityRecord, record2: &IdentityRecord) -> SimilarityResult {
        match self.ready_model() {
            Ok(model) => self.compare_with_model(&model, record1, record2),
            Err(e) => {
                tracing::error!("ML comparison failed: {}", e);
                SimilarityResult::failed(MatchMethod::MlBased, e)
            }
        }
    }
}
