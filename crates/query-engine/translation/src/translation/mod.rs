//! Translate the incoming QueryDescriptor to a QueryPlan (SQL) to be run against the database.

pub mod error;
pub mod helpers;
pub mod query;
pub mod request;
pub mod uri;
