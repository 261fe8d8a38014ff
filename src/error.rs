//! Error types for the mortality training and registry engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, MortalityError>;

/// Main error type
#[derive(Error, Debug)]
pub enum MortalityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown category for {field}: {value:?}")]
    UnknownCategory { field: String, value: String },

    #[error("Unsupported model family: {0}")]
    UnsupportedModelFamily(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Activation conflict: {0}")]
    ActivationConflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Job cancelled")]
    Cancelled,
}

/// Serializable error classification recorded on failed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UnknownCategory,
    UnsupportedModelFamily,
    Training,
    Storage,
    NotFound,
    ActivationConflict,
    Cancelled,
    Internal,
}

impl MortalityError {
    /// Classify this error for job records and API responses
    pub fn kind(&self) -> ErrorKind {
        match self {
            MortalityError::Validation(_) => ErrorKind::Validation,
            MortalityError::UnknownCategory { .. } => ErrorKind::UnknownCategory,
            MortalityError::UnsupportedModelFamily(_) => ErrorKind::UnsupportedModelFamily,
            MortalityError::Training(_)
            | MortalityError::ShapeError { .. }
            | MortalityError::ModelNotFitted => ErrorKind::Training,
            MortalityError::Storage(_)
            | MortalityError::Serialization(_)
            | MortalityError::Io(_) => ErrorKind::Storage,
            MortalityError::NotFound(_) => ErrorKind::NotFound,
            MortalityError::ActivationConflict(_) => ErrorKind::ActivationConflict,
            MortalityError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<serde_json::Error> for MortalityError {
    fn from(err: serde_json::Error) -> Self {
        MortalityError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for MortalityError {
    fn from(err: bincode::Error) -> Self {
        MortalityError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MortalityError {
    fn from(err: ndarray::ShapeError) -> Self {
        MortalityError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for MortalityError {
    fn from(err: polars::error::PolarsError) -> Self {
        MortalityError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MortalityError::UnknownCategory {
            field: "county".to_string(),
            value: "Atlantis".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown category for county: \"Atlantis\"");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MortalityError = io_err.into();
        assert!(matches!(err, MortalityError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ActivationConflict).unwrap();
        assert_eq!(json, "\"activation_conflict\"");
    }
}
