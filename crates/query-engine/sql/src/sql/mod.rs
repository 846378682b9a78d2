//! Definition of SQL AST, helpers and conversion to strings.

pub mod ast;
pub mod convert;
pub mod execution_plan;
pub mod helpers;
pub mod string;
