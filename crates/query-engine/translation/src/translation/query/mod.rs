//! Translate an incoming `QueryDescriptor`.

pub mod fields;
pub mod filtering;
pub mod root;
pub mod sorting;
pub mod values;

use query_engine_metadata::metadata;
use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::Env;
use crate::translation::request::QueryDescriptor;

/// Translate the incoming QueryDescriptor to a QueryPlan to be run against the database.
pub fn translate(
    metadata: &metadata::Metadata,
    descriptor: &QueryDescriptor,
) -> Result<sql::execution_plan::QueryPlan, Error> {
    let env = Env::new(metadata);
    let plan = root::translate_query(&env, descriptor)?;

    let query = plan.query_sql();
    tracing::info!(
        entity_type = %plan.entity_type,
        sql = %query.sql,
        params = ?query.params,
        "Generated query",
    );

    Ok(plan)
}
