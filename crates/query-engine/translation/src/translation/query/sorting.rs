//! Translate the ordering of a query.

use std::collections::BTreeSet;

use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::EntityTable;
use crate::translation::request::{OrderByItem, OrderDirection};

/// Convert the requested ordering to an ORDER BY clause.
///
/// With `tie_breakers`, the key columns (or all columns when the entity type declares
/// no key) follow the requested ones in ascending order, which makes the order total
/// and pages taken with LIMIT/OFFSET disjoint.
pub fn translate_order_by(
    table: &EntityTable,
    order_by: &[OrderByItem],
    tie_breakers: bool,
) -> Result<sql::ast::OrderBy, Error> {
    // a column already ordered by decides nothing further down the list
    let mut ordered_columns = BTreeSet::new();
    let mut elements = vec![];

    for item in order_by {
        let column = table.lookup_column(&item.property)?;
        if ordered_columns.insert(column.name.0.clone()) {
            elements.push(sql::ast::OrderByElement {
                target: table.column_expression(&column),
                direction: match item.direction {
                    OrderDirection::Asc => sql::ast::OrderByDirection::Asc,
                    OrderDirection::Desc => sql::ast::OrderByDirection::Desc,
                },
            });
        }
    }

    if tie_breakers {
        for column in table.key_columns() {
            if ordered_columns.insert(column.name.0.clone()) {
                elements.push(sql::ast::OrderByElement {
                    target: table.column_expression(&column),
                    direction: sql::ast::OrderByDirection::Asc,
                });
            }
        }
    }

    Ok(sql::ast::OrderBy { elements })
}
