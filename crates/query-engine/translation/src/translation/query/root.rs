//! Handle the translation of a whole query descriptor.

use query_engine_sql::sql;

use super::{fields, filtering, sorting};
use crate::translation::error::Error;
use crate::translation::helpers::Env;
use crate::translation::request::QueryDescriptor;

/// Translate a query descriptor to a plan: the select statement and its projection.
pub fn translate_query(
    env: &Env,
    descriptor: &QueryDescriptor,
) -> Result<sql::execution_plan::QueryPlan, Error> {
    let table = env.lookup_entity_type(&descriptor.entity_type)?;

    let limit = sql::ast::Limit {
        limit: translate_pagination("take", descriptor.take)?,
        offset: translate_pagination("skip", descriptor.skip)?,
    };

    let fields = fields::translate_fields(&table, &descriptor.select)?;

    let where_ = match &descriptor.predicate {
        None => sql::helpers::empty_where(),
        Some(predicate) => filtering::translate_expression(env, &table, predicate)?,
    };

    let paginated = limit.limit.is_some() || limit.offset.is_some();
    let order_by = sorting::translate_order_by(
        &table,
        &descriptor.order_by,
        paginated || descriptor.order_by.is_empty(),
    )?;

    let mut select = sql::helpers::simple_select(fields.select_list);
    select.from = Some(table.from_clause());
    select.where_ = sql::ast::Where(where_);
    select.order_by = order_by;
    select.limit = limit;

    Ok(sql::execution_plan::QueryPlan {
        entity_type: table.name.to_string(),
        table: table.reference,
        select,
        projection: fields.projection,
    })
}

/// Skip and take must fit the LIMIT/OFFSET range.
fn translate_pagination(parameter: &'static str, value: Option<i64>) -> Result<Option<u32>, Error> {
    value
        .map(|value| {
            u32::try_from(value).map_err(|_| Error::InvalidPagination {
                parameter,
                value: value.to_string(),
            })
        })
        .transpose()
}
