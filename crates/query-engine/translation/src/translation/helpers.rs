//! Helpers for processing requests and building SQL.

use query_engine_metadata::metadata;
use query_engine_sql::sql;

use super::error::Error;

/// Static information from the query and metadata.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    metadata: &'a metadata::Metadata,
}

/// An entity type resolved against the metadata, together with the table alias
/// its columns are referenced through.
#[derive(Debug, Clone)]
pub struct EntityTable<'a> {
    /// The entity type name as declared in the metadata.
    pub name: &'a str,
    pub info: &'a metadata::EntityTypeInfo,
    pub reference: sql::ast::TableReference,
    pub alias: sql::ast::TableAlias,
}

/// A property resolved against the metadata.
#[derive(Debug, Clone)]
pub struct ColumnInfo<'a> {
    /// The declared property name, which may differ in case from the requested one.
    pub property: &'a str,
    pub name: sql::ast::ColumnName,
    pub r#type: metadata::ScalarType,
    pub nullable: bool,
}

impl<'a> Env<'a> {
    /// Create a new Env by supplying the metadata.
    pub fn new(metadata: &'a metadata::Metadata) -> Env<'a> {
        Env { metadata }
    }

    /// Lookup an entity type by its name or resource name.
    pub fn lookup_entity_type(&self, name: &str) -> Result<EntityTable<'a>, Error> {
        let (entity_name, info) = self
            .metadata
            .entity_types
            .lookup(name)
            .ok_or_else(|| Error::UnknownEntityType(name.to_string()))?;
        let alias = sql::helpers::make_table_alias(info.table_name.clone());
        Ok(EntityTable {
            name: entity_name,
            info,
            reference: sql::ast::TableReference::AliasedTable(alias.clone()),
            alias,
        })
    }

    /// Which LIKE operator the string functions lower to.
    pub fn like_operator(&self) -> sql::ast::BinaryOperator {
        match self.metadata.string_matching {
            metadata::StringMatching::CaseSensitive => sql::ast::BinaryOperator::Like,
            metadata::StringMatching::CaseInsensitive => {
                sql::ast::BinaryOperator::CaseInsensitiveLike
            }
        }
    }
}

impl<'a> EntityTable<'a> {
    /// The table as it appears in a FROM clause.
    pub fn from_clause(&self) -> sql::ast::From {
        sql::ast::From::Table {
            reference: sql::ast::TableReference::DBTable {
                schema: sql::ast::SchemaName(self.info.schema_name.clone()),
                table: sql::ast::TableName(self.info.table_name.clone()),
            },
            alias: self.alias.clone(),
        }
    }

    /// Resolve a property name.
    ///
    /// An exact match wins. Otherwise a single property whose name differs only in
    /// ASCII case is accepted, since URI clients commonly send `CompanyName` for
    /// `companyName`.
    pub fn lookup_column(&self, property: &str) -> Result<ColumnInfo<'a>, Error> {
        let info: &'a metadata::EntityTypeInfo = self.info;
        let found = info.properties.get_key_value(property).or_else(|| {
            let mut candidates = info
                .properties
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(property));
            match (candidates.next(), candidates.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        });
        found
            .map(|(name, property_info)| column_info(name, property_info))
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: self.name.to_string(),
                property: property.to_string(),
            })
    }

    /// Every declared property, in declaration order.
    pub fn all_columns(&self) -> Vec<ColumnInfo<'a>> {
        let info: &'a metadata::EntityTypeInfo = self.info;
        info.all_properties()
            .map(|(name, property_info)| column_info(name, property_info))
            .collect()
    }

    /// The key properties, or every property when no key is declared.
    pub fn key_columns(&self) -> Vec<ColumnInfo<'a>> {
        let info: &'a metadata::EntityTypeInfo = self.info;
        let keys: Vec<ColumnInfo<'a>> = info
            .key_properties()
            .map(|(name, property_info)| column_info(name, property_info))
            .collect();
        if keys.is_empty() {
            self.all_columns()
        } else {
            keys
        }
    }

    /// A reference to a column of this table.
    pub fn column_expression(&self, column: &ColumnInfo<'_>) -> sql::ast::Expression {
        sql::ast::Expression::ColumnReference(sql::ast::ColumnReference::TableColumn {
            table: self.reference.clone(),
            name: column.name.clone(),
        })
    }
}

fn column_info<'a>(name: &'a str, property: &'a metadata::PropertyInfo) -> ColumnInfo<'a> {
    ColumnInfo {
        property: name,
        name: sql::ast::ColumnName(property.column_name.clone()),
        r#type: property.r#type,
        nullable: property.nullable,
    }
}
