//! Training, evaluation and the persisted model

use crate::classifier::{Classifier, ClassifierKind};
use crate::metrics::{accuracy, classification_report, roc_auc, ClassificationReport};
use crate::scaler::StandardScaler;
use crate::synthetic::SyntheticDataGenerator;
use idmatch_core::{Error, IdentityRecord, MatchConfig, Result};
use idmatch_similarity::{feature_names, FeatureExtractor, FeatureVector, FEATURE_NAMES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A fitted classifier with the scaler and feature layout it was trained on
///
/// Immutable once built; shared between threads behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    classifier: Classifier,
    scaler: StandardScaler,
    feature_names: Vec<String>,
    kind: ClassifierKind,
}

impl TrainedModel {
    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Match probability for an already extracted feature vector
    pub fn predict_features(&self, features: &FeatureVector) -> f64 {
        self.classifier.predict_proba(&self.scaler.transform(features))
    }

    /// Write the model to a single artifact file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        idmatch_storage::save_artifact(path.as_ref(), self.kind.as_str(), self)
            .map(|_| ())
            .map_err(|e| Error::Persistence(format!("{:#}", e)))
    }

    /// Read a model artifact, rejecting one built for another feature layout
    /// or whose header disagrees with the classifier it carries
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("model artifact {:?} not found", path),
            )));
        }

        let artifact = idmatch_storage::load_artifact::<TrainedModel>(path)
            .map_err(|e| Error::Persistence(format!("{:#}", e)))?;
        let header_kind = artifact.header.kind;
        let model = artifact.payload;

        let fitted_kind = model.classifier.kind();
        if header_kind != model.kind.as_str() || fitted_kind != model.kind {
            return Err(Error::ArtifactMismatch {
                expected: vec![header_kind],
                found: vec![model.kind.to_string(), fitted_kind.to_string()],
            });
        }

        if model.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(Error::ArtifactMismatch {
                expected: feature_names(),
                found: model.feature_names,
            });
        }

        tracing::info!("Model loaded from {:?} ({})", path, model.kind);
        Ok(model)
    }
}

/// Held-out evaluation of a freshly trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub auc_score: f64,
    pub classification_report: ClassificationReport,
    pub train_size: usize,
    pub test_size: usize,
    pub kind: ClassifierKind,
}

/// Result of one training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub report: EvaluationReport,
}

/// Builds models from synthetic data
#[derive(Debug, Clone)]
pub struct Trainer {
    config: Arc<MatchConfig>,
    extractor: FeatureExtractor,
}

impl Trainer {
    pub fn new(config: Arc<MatchConfig>) -> Result<Self> {
        let extractor = FeatureExtractor::new(&config)?;
        Ok(Self { config, extractor })
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Generate `sample_count` labelled pairs, fit the configured classifier
    /// and evaluate it on a held-out split
    ///
    /// The scaler is fitted on the whole dataset before splitting.
    pub fn fit(&self, sample_count: usize) -> Result<TrainingOutcome> {
        let kind: ClassifierKind = self.config.classifier.parse()?;

        let test_size = (sample_count as f64 * self.config.test_split_fraction).ceil() as usize;
        if sample_count == 0 || test_size == 0 || test_size >= sample_count {
            return Err(Error::Training(format!(
                "{} samples cannot be split with test fraction {}",
                sample_count, self.config.test_split_fraction
            )));
        }

        tracing::info!("Generating {} synthetic training samples...", sample_count);
        let seed = self.config.random_seed;
        let mut generator = SyntheticDataGenerator::new(StdRng::seed_from_u64(seed));
        let dataset = generator.dataset(sample_count, &self.extractor);

        let scaler = StandardScaler::fit(&dataset.features)?;
        let scaled = scaler.transform_all(&dataset.features);

        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(test_size);

        let gather = |idx: &[usize]| -> (Vec<FeatureVector>, Vec<bool>) {
            idx.iter().map(|&i| (scaled[i], dataset.labels[i])).unzip()
        };
        let (x_train, y_train) = gather(train_idx);
        let (x_test, y_test) = gather(test_idx);

        tracing::info!("Training {} model...", kind);
        let classifier = Classifier::fit(kind, &x_train, &y_train, &self.config)?;

        let probabilities: Vec<f64> = x_test.iter().map(|x| classifier.predict_proba(x)).collect();
        let predictions: Vec<bool> = probabilities.iter().map(|&p| p > 0.5).collect();

        let report = EvaluationReport {
            accuracy: accuracy(&y_test, &predictions),
            auc_score: roc_auc(&y_test, &probabilities)?,
            classification_report: classification_report(&y_test, &predictions),
            train_size: x_train.len(),
            test_size: x_test.len(),
            kind,
        };

        tracing::info!(
            "Model training completed. Accuracy: {:.3}, AUC: {:.3}",
            report.accuracy,
            report.auc_score
        );

        Ok(TrainingOutcome {
            model: TrainedModel {
                classifier,
                scaler,
                feature_names: feature_names(),
                kind,
            },
            report,
        })
    }

    /// Match probability of a record pair under `model`
    pub fn predict(
        &self,
        model: &TrainedModel,
        record1: &IdentityRecord,
        record2: &IdentityRecord,
    ) -> f64 {
        model.predict_features(&self.extractor.extract(record1, record2))
    }
}
