//! Fixtures and helpers shared by the test suites of the workspace.

pub mod deployment;
pub mod fixture;
pub mod memory;
