use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model artifact missing: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Model artifact error: {0}")]
    Artifact(String),

    #[error("Recommender unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Graph data source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RecommendError {
    /// Failures that only disable one recommender path rather than the process.
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            RecommendError::ArtifactMissing(_) | RecommendError::Artifact(_)
        )
    }
}

impl From<serde_json::Error> for RecommendError {
    fn from(err: serde_json::Error) -> Self {
        RecommendError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for RecommendError {
    fn from(err: config::ConfigError) -> Self {
        RecommendError::Configuration(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RecommendError {
    fn from(err: ndarray::ShapeError) -> Self {
        RecommendError::InvalidInput(err.to_string())
    }
}
