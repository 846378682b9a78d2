//! Errors for query execution.

use query_engine_metadata::metadata::ScalarType;
use thiserror::Error;

/// A type for execution errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Execution(#[from] ExecutionError),
    #[error("{0}")]
    Mapping(#[from] MappingError),
}

/// The row source failed to produce rows.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Row source error: {0}")]
    Source(String),
    #[error("Expected a row as a json object, got {0}")]
    UnexpectedRowShape(String),
}

/// A row did not have the shape its query plan promised.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    #[error("Column '{column}' for property '{property}' is missing from the row.")]
    MissingColumn { property: String, column: String },
    #[error("Cannot read {value} as {expected} for property '{property}'.")]
    UncastableValue {
        property: String,
        expected: ScalarType,
        value: String,
    },
}
