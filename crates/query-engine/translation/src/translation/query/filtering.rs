//! Handle filtering/where clauses translation.

use query_engine_metadata::metadata::{ComparisonOperator, ScalarType, StringFunction};
use query_engine_sql::sql;

use super::values;
use crate::translation::error::Error;
use crate::translation::helpers::{ColumnInfo, EntityTable, Env};
use crate::translation::request::{Operand, Operator, PredicateNode};

/// Translate a predicate into a boolean SQL expression over the entity's table.
pub fn translate_expression(
    env: &Env,
    table: &EntityTable,
    predicate: &PredicateNode,
) -> Result<sql::ast::Expression, Error> {
    match predicate {
        PredicateNode::And { left, right } => Ok(sql::ast::Expression::And {
            left: Box::new(translate_expression(env, table, left)?),
            right: Box::new(translate_expression(env, table, right)?),
        }),
        PredicateNode::Or { left, right } => Ok(sql::ast::Expression::Or {
            left: Box::new(translate_expression(env, table, left)?),
            right: Box::new(translate_expression(env, table, right)?),
        }),
        PredicateNode::Not { inner } => Ok(sql::ast::Expression::Not(Box::new(
            translate_expression(env, table, inner)?,
        ))),
        PredicateNode::Comparison {
            property,
            operator: Operator::Known(operator),
            operand,
        } => translate_comparison(table, property, *operator, operand),
        PredicateNode::Comparison {
            operator: Operator::Unknown(name),
            ..
        } => Err(unsupported(table, name, "unknown comparison operator")),
        PredicateNode::StringFunction {
            function,
            property,
            operand,
        } => translate_string_function(env, table, *function, property, operand),
    }
}

fn translate_comparison(
    table: &EntityTable,
    property: &str,
    operator: ComparisonOperator,
    operand: &Operand,
) -> Result<sql::ast::Expression, Error> {
    let column = table.lookup_column(property)?;
    let left = table.column_expression(&column);

    match operand {
        Operand::Property { name } => {
            let other = table.lookup_column(name)?;
            if !column.r#type.is_comparable_with(other.r#type) {
                return Err(type_mismatch(
                    table,
                    &column,
                    format!("property '{}' of type {}", other.property, other.r#type),
                ));
            }
            check_operator_supported(table, &column, operator)?;
            binary_operation(table, left, operator, table.column_expression(&other))
        }

        Operand::Literal { value } => match (operator, value) {
            (ComparisonOperator::In, serde_json::Value::Array(elements)) => {
                let items = elements
                    .iter()
                    .map(|element| match element {
                        serde_json::Value::Null => {
                            Err(type_mismatch(table, &column, values::describe(element)))
                        }
                        _ => translate_literal(table, &column, element),
                    })
                    .collect::<Result<Vec<_>, Error>>()?;
                if items.is_empty() {
                    Ok(sql::helpers::false_expr())
                } else {
                    Ok(sql::ast::Expression::BinaryArrayOperation {
                        left: Box::new(left),
                        operator: sql::ast::BinaryArrayOperator::In,
                        right: items.into_iter().map(sql::ast::Expression::Value).collect(),
                    })
                }
            }
            (ComparisonOperator::In, _) => {
                Err(type_mismatch(table, &column, values::describe(value)))
            }
            (ComparisonOperator::Equals, serde_json::Value::Null) => {
                Ok(null_check(left, sql::ast::UnaryOperator::IsNull))
            }
            (ComparisonOperator::NotEquals, serde_json::Value::Null) => {
                Ok(null_check(left, sql::ast::UnaryOperator::IsNotNull))
            }
            (_, serde_json::Value::Null) => {
                Err(type_mismatch(table, &column, values::describe(value)))
            }
            (_, _) => {
                check_operator_supported(table, &column, operator)?;
                let right = translate_literal(table, &column, value)?;
                binary_operation(table, left, operator, sql::ast::Expression::Value(right))
            }
        },
    }
}

/// Lower a string function to `LIKE` (or `ILIKE`) with a pattern anchored as needed.
fn translate_string_function(
    env: &Env,
    table: &EntityTable,
    function: StringFunction,
    property: &str,
    operand: &Operand,
) -> Result<sql::ast::Expression, Error> {
    let column = table.lookup_column(property)?;
    if !column.r#type.supports_string_functions() {
        return Err(unsupported(
            table,
            function.name(),
            &format!(
                "property '{}' is of type {}, not string",
                column.property, column.r#type
            ),
        ));
    }
    let (leading_wildcard, trailing_wildcard) = match function {
        StringFunction::StartsWith => (false, true),
        StringFunction::EndsWith => (true, false),
        StringFunction::Contains => (true, true),
    };

    let pattern = match operand {
        Operand::Literal {
            value: serde_json::Value::String(literal),
        } => {
            let mut pattern = String::with_capacity(literal.len() + 2);
            if leading_wildcard {
                pattern.push('%');
            }
            pattern.push_str(&sql::helpers::escape_like_literal(literal));
            if trailing_wildcard {
                pattern.push('%');
            }
            sql::ast::Expression::Value(sql::ast::Value::String(pattern))
        }
        Operand::Literal { value } => {
            return Err(type_mismatch(table, &column, values::describe(value)));
        }
        Operand::Property { name } => {
            let other = table.lookup_column(name)?;
            if other.r#type != ScalarType::String {
                return Err(type_mismatch(
                    table,
                    &column,
                    format!("property '{}' of type {}", other.property, other.r#type),
                ));
            }
            sql::helpers::like_pattern_from_expression(
                table.column_expression(&other),
                leading_wildcard,
                trailing_wildcard,
            )
        }
    };

    Ok(sql::ast::Expression::BinaryOperation {
        left: Box::new(table.column_expression(&column)),
        operator: env.like_operator(),
        right: Box::new(pattern),
    })
}

fn translate_literal(
    table: &EntityTable,
    column: &ColumnInfo,
    value: &serde_json::Value,
) -> Result<sql::ast::Value, Error> {
    values::translate_json_value(value, column.r#type)
        .ok_or_else(|| type_mismatch(table, column, values::describe(value)))
}

fn check_operator_supported(
    table: &EntityTable,
    column: &ColumnInfo,
    operator: ComparisonOperator,
) -> Result<(), Error> {
    if column.r#type.comparison_operators().contains(&operator) {
        Ok(())
    } else {
        Err(unsupported(
            table,
            operator.name(),
            &format!(
                "values of type {} of property '{}' are not ordered",
                column.r#type, column.property
            ),
        ))
    }
}

fn binary_operation(
    table: &EntityTable,
    left: sql::ast::Expression,
    operator: ComparisonOperator,
    right: sql::ast::Expression,
) -> Result<sql::ast::Expression, Error> {
    let operator = match operator {
        ComparisonOperator::Equals => sql::ast::BinaryOperator::Equals,
        ComparisonOperator::NotEquals => sql::ast::BinaryOperator::NotEquals,
        ComparisonOperator::LessThan => sql::ast::BinaryOperator::LessThan,
        ComparisonOperator::LessThanOrEqualTo => sql::ast::BinaryOperator::LessThanOrEqualTo,
        ComparisonOperator::GreaterThan => sql::ast::BinaryOperator::GreaterThan,
        ComparisonOperator::GreaterThanOrEqualTo => {
            sql::ast::BinaryOperator::GreaterThanOrEqualTo
        }
        ComparisonOperator::In => {
            return Err(unsupported(
                table,
                operator.name(),
                "'in' requires an array of literal values",
            ))
        }
    };
    Ok(sql::ast::Expression::BinaryOperation {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    })
}

fn null_check(
    expression: sql::ast::Expression,
    operator: sql::ast::UnaryOperator,
) -> sql::ast::Expression {
    sql::ast::Expression::UnaryOperation {
        expression: Box::new(expression),
        operator,
    }
}

fn type_mismatch(table: &EntityTable, column: &ColumnInfo, found: String) -> Error {
    Error::TypeMismatch {
        entity_type: table.name.to_string(),
        property: column.property.to_string(),
        expected: column.r#type,
        found,
    }
}

fn unsupported(table: &EntityTable, operator: &str, reason: &str) -> Error {
    Error::UnsupportedOperator {
        entity_type: table.name.to_string(),
        operator: operator.to_string(),
        reason: reason.to_string(),
    }
}
