//! Running query plans against a row source and mapping the rows back to entity records.

pub mod error;
pub mod mapping;
pub mod metrics;
pub mod postgres;
pub mod query;
pub mod source;
