use std::path::PathBuf;

use entity_query_configuration::environment::{FixedEnvironment, Variable};
use entity_query_configuration::version1::DEFAULT_CONNECTION_URI_VARIABLE;
use query_engine_metadata::metadata;
use query_engine_sql::sql;
use query_engine_translation::translation;

/// Load the Northwind metadata the same way the engine does at startup.
pub async fn northwind_metadata() -> anyhow::Result<metadata::Metadata> {
    let _ = env_logger::builder().is_test(true).try_init();

    let directory = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../../static/northwind");
    let parsed_configuration = entity_query_configuration::parse_configuration(&directory).await?;
    let configuration = entity_query_configuration::make_runtime_configuration(
        parsed_configuration,
        FixedEnvironment::from([(
            Variable::from(DEFAULT_CONNECTION_URI_VARIABLE),
            "the translation tests do not rely on a database connection".into(),
        )]),
    )?;
    Ok(configuration.metadata)
}

/// Translate a descriptor against the Northwind metadata and render its SQL.
pub async fn test_translation(
    descriptor: &translation::request::QueryDescriptor,
) -> anyhow::Result<sql::string::SQL> {
    let metadata = northwind_metadata().await?;
    let plan = translation::query::translate(&metadata, descriptor)?;
    Ok(plan.query_sql())
}

/// The error a descriptor fails to translate with.
pub async fn translation_error(
    descriptor: &translation::request::QueryDescriptor,
) -> translation::error::Error {
    let metadata = northwind_metadata().await.unwrap();
    match translation::query::translate(&metadata, descriptor) {
        Ok(plan) => panic!("expected an error, got {}", plan.query_sql().sql),
        Err(error) => error,
    }
}
