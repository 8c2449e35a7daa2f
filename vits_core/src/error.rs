use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the model cache, loader and synthesis pipeline.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model manifest not found: {0}")]
    ManifestMissing(PathBuf),

    #[error("Model manifest {path} cannot be read: {source}")]
    ManifestUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Model manifest {path} is invalid: {source}")]
    ManifestInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to load model from {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("Model at {path} is unavailable: {reason}")]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("Model {0} not found")]
    ModelNotFound(String),

    #[error("Text too long ({len} characters, max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unknown speaker: {0}")]
    UnknownSpeaker(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(anyhow::Error),

    #[error("Failed to write audio file {path}: {source}")]
    Output {
        path: PathBuf,
        source: hound::Error,
    },
}

impl ModelError {
    pub(crate) fn load(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        ModelError::ModelLoad {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ModelError::ModelUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
