//! Handle the selection of properties and the projection back to entity records.

use std::collections::BTreeSet;

use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::{ColumnInfo, EntityTable};
use crate::translation::request::Selection;

/// The select list of a query, and how each record is projected from its columns.
pub struct Fields {
    pub select_list: Vec<(sql::ast::ColumnAlias, sql::ast::Expression)>,
    pub projection: Vec<sql::execution_plan::ProjectedProperty>,
}

/// Translate the property selection of a query to SQL.
///
/// Every projected property reads from a column aliased by its column name, so two
/// properties backed by the same column share one entry in the select list.
pub fn translate_fields(table: &EntityTable, selection: &Selection) -> Result<Fields, Error> {
    let columns: Vec<ColumnInfo> = match selection {
        Selection::All => table.all_columns(),
        Selection::Properties(properties) if properties.is_empty() => {
            return Err(Error::NoFields(table.name.to_string()));
        }
        Selection::Properties(properties) => properties
            .iter()
            .map(|property| table.lookup_column(property))
            .collect::<Result<_, Error>>()?,
    };

    let mut seen_properties = BTreeSet::new();
    let mut select_list: Vec<(sql::ast::ColumnAlias, sql::ast::Expression)> = vec![];
    let mut projection = vec![];

    for column in columns {
        if !seen_properties.insert(column.property) {
            continue;
        }
        let alias = sql::helpers::make_column_alias(column.name.0.clone());
        if !select_list.iter().any(|(existing, _)| *existing == alias) {
            select_list.push((alias.clone(), table.column_expression(&column)));
        }
        projection.push(sql::execution_plan::ProjectedProperty {
            property: column.property.to_string(),
            column: alias,
            r#type: column.r#type,
        });
    }

    Ok(Fields {
        select_list,
        projection,
    })
}
