//! Map rows to entity records.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;

use query_engine_metadata::metadata::{temporal, ScalarType};
use query_engine_sql::sql::execution_plan::ProjectedProperty;

use crate::error::MappingError;
use crate::source::Row;

/// A property value of an entity record, typed by the property's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

/// An entity record: the projected properties, in projection order.
pub type EntityRecord = IndexMap<String, EntityValue>;

impl EntityValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EntityValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EntityValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<NaiveDateTime> {
        match self {
            EntityValue::DateTime(t) => Some(*t),
            _ => None,
        }
    }
}

/// Build a record holding exactly the projected properties of a row.
pub fn map_row(projection: &[ProjectedProperty], row: &Row) -> Result<EntityRecord, MappingError> {
    projection
        .iter()
        .map(|projected| {
            let value = row.get(&projected.column.name).ok_or_else(|| {
                MappingError::MissingColumn {
                    property: projected.property.clone(),
                    column: projected.column.name.clone(),
                }
            })?;
            let value = cast(value, projected.r#type).ok_or_else(|| {
                MappingError::UncastableValue {
                    property: projected.property.clone(),
                    expected: projected.r#type,
                    value: value.to_string(),
                }
            })?;
            Ok((projected.property.clone(), value))
        })
        .collect()
}

/// Cast a value as the store returned it to the declared type.
pub fn cast(value: &serde_json::Value, scalar_type: ScalarType) -> Option<EntityValue> {
    use serde_json::Value;

    match (value, scalar_type) {
        (Value::Null, _) => Some(EntityValue::Null),

        (Value::Bool(b), ScalarType::Boolean) => Some(EntityValue::Boolean(*b)),
        (Value::Number(n), ScalarType::Boolean) => match n.as_i64() {
            Some(0) => Some(EntityValue::Boolean(false)),
            Some(1) => Some(EntityValue::Boolean(true)),
            _ => None,
        },
        (Value::String(s), ScalarType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(EntityValue::Boolean(true)),
            "false" | "f" | "0" => Some(EntityValue::Boolean(false)),
            _ => None,
        },

        (Value::Number(n), ScalarType::Int) => n.as_i64().map(EntityValue::Int).or_else(|| {
            let f = n.as_f64()?;
            // numeric columns come back as 12.0
            (f.fract() == 0.0 && f.abs() < 9.0e15).then(|| EntityValue::Int(f as i64))
        }),
        (Value::String(s), ScalarType::Int) => s.trim().parse().ok().map(EntityValue::Int),

        (Value::Number(n), ScalarType::Float) => n.as_f64().map(EntityValue::Float),
        (Value::String(s), ScalarType::Float) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(EntityValue::Float),

        (Value::String(s), ScalarType::String) => Some(EntityValue::String(s.clone())),
        (Value::Number(n), ScalarType::String) => Some(EntityValue::String(n.to_string())),
        (Value::Bool(b), ScalarType::String) => Some(EntityValue::String(b.to_string())),

        (Value::String(s), ScalarType::DateTime) => {
            temporal::parse_date_time(s).map(EntityValue::DateTime)
        }

        _ => None,
    }
}
