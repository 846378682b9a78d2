//! The Northwind rows the in-memory row source serves.

use std::collections::BTreeMap;

use query_engine_execution::source::Row;

const NORTHWIND_ROWS: &str = include_str!("../../../../static/northwind/rows.json");

/// Rows keyed by schema and table name, each row keyed by column name.
pub type Tables = BTreeMap<(String, String), Vec<Row>>;

/// Load the Northwind rows.
pub fn northwind_tables() -> anyhow::Result<Tables> {
    let schemas: BTreeMap<String, BTreeMap<String, Vec<Row>>> =
        serde_json::from_str(NORTHWIND_ROWS)?;
    Ok(schemas
        .into_iter()
        .flat_map(|(schema, tables)| {
            tables
                .into_iter()
                .map(move |(table, rows)| ((schema.clone(), table), rows))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_every_table() {
        let tables = northwind_tables().unwrap();
        let employees = &tables[&("public".to_string(), "employees".to_string())];
        assert_eq!(employees.len(), 9);
        assert_eq!(tables.len(), 5);
    }
}
