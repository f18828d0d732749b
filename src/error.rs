//! Error types for the pricing pipeline.

use thiserror::Error;

/// Errors produced while loading data, training models or serving predictions.
///
/// Every variant is structural: retrying the same call with the same input
/// fails the same way, so callers should report and halt.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The tabular source could not be opened or read.
    #[error("failed to load data from {path}: {reason}")]
    DataLoad { path: String, reason: String },

    /// The pipeline configuration holds values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required field is missing or holds a value that cannot be parsed.
    #[error("invalid data in field '{field}'{}: {reason}", row_suffix(.row))]
    DataFormat {
        field: String,
        row: Option<usize>,
        reason: String,
    },

    /// Training is impossible on the given table (too few rows, constant target).
    #[error("training failed with {rows} rows: {reason}")]
    Training { rows: usize, reason: String },

    /// A projected feature vector does not line up with the trained schema.
    #[error("schema mismatch: expected {expected} features, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    /// The requested model family was not trained.
    #[error("unknown model '{label}' (available: {available})")]
    UnknownModel { label: String, available: String },

    /// An artifact could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" at row {}", r),
        None => String::new(),
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl PipelineError {
    pub(crate) fn data_format(
        field: impl Into<String>,
        row: Option<usize>,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::DataFormat {
            field: field.into(),
            row,
            reason: reason.into(),
        }
    }

    pub(crate) fn training(rows: usize, reason: impl Into<String>) -> Self {
        PipelineError::Training {
            rows,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
