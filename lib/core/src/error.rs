use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not trained yet: call train() or load() first")]
    ModelNotReady,

    /// Saved model does not fit this build: feature layout or classifier kind
    #[error("Artifact mismatch: expected {expected:?}, found {found:?}")]
    ArtifactMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unsupported classifier kind: {0}")]
    UnsupportedClassifierKind(String),

    #[error("Similarity computation failed: {0}")]
    Computation(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
