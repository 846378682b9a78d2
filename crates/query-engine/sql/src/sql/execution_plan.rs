//! Describe the plan for running a translated query and reading its rows back.

use query_engine_metadata::metadata;

use super::ast;
use super::convert::select_to_sql;
use super::helpers;
use super::string;

/// The column-level, store-ready representation of an entity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// The entity type the query was issued against.
    pub entity_type: String,
    /// The table being queried.
    pub table: ast::TableReference,
    /// The select statement, including filtering, ordering and pagination.
    pub select: ast::Select,
    /// How to turn each returned row into an entity record, in record order.
    pub projection: Vec<ProjectedProperty>,
}

/// An entity property in the result, and the column alias its value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedProperty {
    pub property: String,
    pub column: ast::ColumnAlias,
    pub r#type: metadata::ScalarType,
}

impl QueryPlan {
    /// Extract the query component as SQL.
    pub fn query_sql(&self) -> string::SQL {
        select_to_sql(&self.select)
    }

    /// The query as sent to the store: each row comes back as a single json object
    /// keyed by column alias.
    pub fn rows_as_json_sql(&self) -> string::SQL {
        select_to_sql(&helpers::select_rows_as_json(self.select.clone()))
    }

    /// Pretty print the query for logs and debugging.
    pub fn explain(&self) -> String {
        let query = self.query_sql();
        sqlformat::format(
            &query.sql,
            &sqlformat::QueryParams::None,
            sqlformat::FormatOptions::default(),
        )
    }
}
