//! Deployment functions used across test cases.

use std::path::PathBuf;

use entity_query_configuration::environment::{FixedEnvironment, Variable};
use entity_query_configuration::version1::DEFAULT_CONNECTION_URI_VARIABLE;
use entity_query_configuration::Configuration;

/// The Northwind configuration directory, relative to the project root.
pub const NORTHWIND_CONFIGURATION: &str = "static/northwind";

/// Find the project root via the crate root provided by `cargo test`,
/// and get a path inside it.
/// This depends on the convention that all our crates live in `/crates/<group>/<name>`.
pub fn get_path_from_project_root(path: &str) -> PathBuf {
    let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    d.push("../../../");
    d.push(path);
    d
}

/// Initialise test logging. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Load the Northwind configuration the way the engine does at startup, with a
/// connection string that is never used.
pub async fn northwind_configuration() -> anyhow::Result<Configuration> {
    init_logging();
    let parsed = entity_query_configuration::parse_configuration(get_path_from_project_root(
        NORTHWIND_CONFIGURATION,
    ))
    .await?;
    let environment = FixedEnvironment::from([(
        Variable::from(DEFAULT_CONNECTION_URI_VARIABLE),
        "postgresql://localhost:5432/northwind".to_string(),
    )]);
    Ok(entity_query_configuration::make_runtime_configuration(
        parsed,
        environment,
    )?)
}
