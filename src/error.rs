//! Error types shared by the trainer, the evaluator and the service.

use thiserror::Error;

/// Errors raised while loading data, fitting, scoring or persisting a model.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    #[error("Invalid value at row {row}, column {column}: {value:?}")]
    InvalidValue {
        row: u64,
        column: String,
        value: String,
    },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Model not fitted: call fit() before scoring")]
    NotFitted,

    #[error("Feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Incompatible model artifact: {0}")]
    IncompatibleArtifact(String),
}

/// Result type for machine-watch operations.
pub type Result<T> = std::result::Result<T, Error>;
