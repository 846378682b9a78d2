//! Handle the translation of literal values.

use query_engine_metadata::metadata::{temporal, ScalarType};
use query_engine_sql::sql;

/// Convert a JSON value into a SQL value of the given scalar type.
///
/// Returns `None` when the value cannot represent the type. `null` is always accepted;
/// callers decide what a null operand means.
pub fn translate_json_value(
    value: &serde_json::Value,
    scalar_type: ScalarType,
) -> Option<sql::ast::Value> {
    match value {
        serde_json::Value::Null => Some(sql::ast::Value::Null),

        // numbers
        serde_json::Value::Number(num) => match scalar_type {
            ScalarType::Int => num
                .as_i64()
                .map(sql::ast::Value::Int8)
                .or_else(|| finite(num.as_f64()?).map(sql::ast::Value::Float8)),
            ScalarType::Float => finite(num.as_f64()?).map(sql::ast::Value::Float8),
            _ => None,
        },

        // booleans
        serde_json::Value::Bool(b) => match scalar_type {
            ScalarType::Boolean => Some(sql::ast::Value::Bool(*b)),
            _ => None,
        },

        // strings
        serde_json::Value::String(s) => match scalar_type {
            ScalarType::String => Some(sql::ast::Value::String(s.clone())),
            // numbers and booleans for when the client sends them as strings
            ScalarType::Int => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .map(sql::ast::Value::Int8)
                    .or_else(|| finite(s.parse::<f64>().ok()?).map(sql::ast::Value::Float8))
            }
            ScalarType::Float => finite(s.trim().parse::<f64>().ok()?).map(sql::ast::Value::Float8),
            ScalarType::Boolean => parse_bool(s).map(sql::ast::Value::Bool),
            ScalarType::DateTime => temporal::parse_date_time(s).map(sql::ast::Value::Timestamp),
        },

        // not supported
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

/// A short description of a JSON value for error messages.
pub fn describe(value: &serde_json::Value) -> String {
    let kind = match value {
        serde_json::Value::Null => return "null".to_string(),
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    };
    format!("{kind} {value}")
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
