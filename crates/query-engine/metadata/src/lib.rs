//! Entity metadata: which entity types exist, which table persists each of them,
//! and how their properties map onto columns.

pub mod metadata;
