use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Image already indexed: {0}")]
    DuplicateImage(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("No record at position {0}")]
    PositionNotFound(usize),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Corrupt snapshot {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("Inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("Provider failure for '{subject}': {message}")]
    ProviderFailure { subject: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VectorStoreError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn provider(subject: impl Into<String>, message: impl ToString) -> Self {
        Self::ProviderFailure {
            subject: subject.into(),
            message: message.to_string(),
        }
    }

    /// Structural errors mean the catalog would drift if the caller kept going.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::DuplicateImage(_)
                | Self::PositionNotFound(_)
                | Self::InconsistentSnapshot(_)
        )
    }
}
