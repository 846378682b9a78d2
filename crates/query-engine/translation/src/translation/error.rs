//! Errors for query translation.

use query_engine_metadata::metadata::ScalarType;
use thiserror::Error;

/// A type for translation errors.
///
/// All of these are raised before anything is sent to the database, and all of them
/// describe a malformed query rather than a transient condition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Entity type '{0}' not found.")]
    UnknownEntityType(String),
    #[error("Property '{property}' not found in entity type '{entity_type}'.")]
    UnknownProperty {
        entity_type: String,
        property: String,
    },
    #[error(
        "Cannot compare '{entity_type}.{property}' of type {expected} with {found}."
    )]
    TypeMismatch {
        entity_type: String,
        property: String,
        expected: ScalarType,
        found: String,
    },
    #[error("Operator '{operator}' is not supported on entity type '{entity_type}': {reason}.")]
    UnsupportedOperator {
        entity_type: String,
        operator: String,
        reason: String,
    },
    #[error("Invalid {parameter} value '{value}': expected a non-negative integer.")]
    InvalidPagination {
        parameter: &'static str,
        value: String,
    },
    #[error("No properties selected for entity type '{0}'.")]
    NoFields(String),
    #[error("Invalid query uri: {0}.")]
    InvalidUri(String),
    #[error("Query option '{0}' is not supported.")]
    UnsupportedQueryOption(String),
}
