//! A SQL AST, its rendering to parameterized SQL text, and the query plan type
//! shared by translation and execution.

pub mod sql;
