//! A row source that evaluates query plans over in-memory tables.
//!
//! It follows PostgreSQL semantics where the engine relies on them: three-valued
//! logic, `LIKE` with `\` escapes, `ASC NULLS LAST` / `DESC NULLS FIRST` ordering and
//! timestamps compared against their text rendering.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};

use query_engine_execution::error::ExecutionError;
use query_engine_execution::source::{Row, RowSource, RowStream};
use query_engine_metadata::metadata::temporal;
use query_engine_sql::sql::ast;
use query_engine_sql::sql::execution_plan::QueryPlan;

use crate::fixture::{self, Tables};

/// Serves query plans from in-memory tables.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    tables: Arc<Tables>,
    fail_after: Option<usize>,
}

impl InMemorySource {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables: Arc::new(tables),
            fail_after: None,
        }
    }

    /// A source over the Northwind fixture.
    pub fn northwind() -> anyhow::Result<Self> {
        Ok(Self::new(fixture::northwind_tables()?))
    }

    /// Yield this many rows, then fail as if the connection dropped.
    #[must_use]
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }
}

impl RowSource for InMemorySource {
    fn rows(&self, plan: &QueryPlan) -> RowStream {
        let tables = Arc::clone(&self.tables);
        let select = plan.select.clone();
        let fail_after = self.fail_after;

        let rows = stream::once(async move {
            let mut rows: Vec<Result<Row, ExecutionError>> =
                match evaluate_select(&tables, &select) {
                    Ok(rows) => rows.into_iter().map(Ok).collect(),
                    Err(error) => vec![Err(error)],
                };
            if let Some(limit) = fail_after {
                rows.truncate(limit);
                rows.push(Err(ExecutionError::Source(
                    "connection closed unexpectedly".to_string(),
                )));
            }
            stream::iter(rows)
        })
        .flatten();

        Box::pin(rows)
    }
}

/// A scalar during evaluation.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Scalar {
    fn from_json(value: &serde_json::Value) -> Result<Scalar, ExecutionError> {
        match value {
            serde_json::Value::Null => Ok(Scalar::Null),
            serde_json::Value::Bool(b) => Ok(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Scalar::Int(i)),
                None => n
                    .as_f64()
                    .map(Scalar::Float)
                    .ok_or_else(|| unsupported(format!("number {n}"))),
            },
            serde_json::Value::String(s) => Ok(Scalar::Text(s.clone())),
            other => Err(unsupported(format!("stored value {other}"))),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Int(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Scalar::Text(s) => serde_json::Value::String(s.clone()),
            Scalar::Timestamp(t) => {
                serde_json::Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }

    fn truth(&self) -> Result<Option<bool>, ExecutionError> {
        match self {
            Scalar::Null => Ok(None),
            Scalar::Bool(b) => Ok(Some(*b)),
            other => Err(unsupported(format!("{other:?} used as a condition"))),
        }
    }
}

impl From<Option<bool>> for Scalar {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Scalar::Null, Scalar::Bool)
    }
}

/// The row being filtered, with the alias its table is referenced through.
struct Scope<'a> {
    alias: &'a ast::TableAlias,
    row: &'a Row,
}

fn evaluate_select(tables: &Tables, select: &ast::Select) -> Result<Vec<Row>, ExecutionError> {
    let (schema, table, alias) = match &select.from {
        Some(ast::From::Table {
            reference: ast::TableReference::DBTable { schema, table },
            alias,
        }) => (schema, table, alias),
        other => return Err(unsupported(format!("FROM clause {other:?}"))),
    };
    let rows = tables
        .get(&(schema.0.clone(), table.0.clone()))
        .ok_or_else(|| ExecutionError::Source(format!("relation {}.{} does not exist", schema.0, table.0)))?;

    let ast::Where(condition) = &select.where_;
    let mut matching = vec![];
    for row in rows {
        let scope = Scope { alias, row };
        if evaluate(&scope, condition)?.truth()? == Some(true) {
            matching.push(row);
        }
    }

    let mut keyed = matching
        .into_iter()
        .map(|row| {
            let scope = Scope { alias, row };
            let keys = select
                .order_by
                .elements
                .iter()
                .map(|element| evaluate(&scope, &element.target))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((keys, row))
        })
        .collect::<Result<Vec<_>, ExecutionError>>()?;
    keyed.sort_by(|(left, _), (right, _)| {
        select
            .order_by
            .elements
            .iter()
            .zip(left.iter().zip(right))
            .map(|(element, (l, r))| order(l, r, element.direction))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let offset = select.limit.offset.map_or(0, |offset| offset as usize);
    let limit = select.limit.limit.map_or(usize::MAX, |limit| limit as usize);

    keyed
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|(_, row)| project(&Scope { alias, row }, &select.select_list))
        .collect()
}

fn project(scope: &Scope, select_list: &ast::SelectList) -> Result<Row, ExecutionError> {
    let ast::SelectList::SelectList(columns) = select_list;
    columns
        .iter()
        .map(|(alias, expression)| Ok((alias.name.clone(), evaluate(scope, expression)?.to_json())))
        .collect()
}

fn evaluate(scope: &Scope, expression: &ast::Expression) -> Result<Scalar, ExecutionError> {
    match expression {
        ast::Expression::And { left, right } => {
            let left = evaluate(scope, left)?.truth()?;
            let right = evaluate(scope, right)?.truth()?;
            Ok(match (left, right) {
                (Some(false), _) | (_, Some(false)) => Scalar::Bool(false),
                (Some(true), Some(true)) => Scalar::Bool(true),
                _ => Scalar::Null,
            })
        }
        ast::Expression::Or { left, right } => {
            let left = evaluate(scope, left)?.truth()?;
            let right = evaluate(scope, right)?.truth()?;
            Ok(match (left, right) {
                (Some(true), _) | (_, Some(true)) => Scalar::Bool(true),
                (Some(false), Some(false)) => Scalar::Bool(false),
                _ => Scalar::Null,
            })
        }
        ast::Expression::Not(inner) => {
            Ok(evaluate(scope, inner)?.truth()?.map(|b| !b).into())
        }
        ast::Expression::BinaryOperation {
            left,
            operator,
            right,
        } => {
            let left = evaluate(scope, left)?;
            let right = evaluate(scope, right)?;
            binary_operation(&left, *operator, &right)
        }
        ast::Expression::BinaryArrayOperation {
            left,
            operator: ast::BinaryArrayOperator::In,
            right,
        } => {
            let left = evaluate(scope, left)?;
            if left == Scalar::Null {
                return Ok(Scalar::Null);
            }
            let mut saw_null = false;
            for item in right {
                let item = evaluate(scope, item)?;
                if item == Scalar::Null {
                    saw_null = true;
                } else if compare(&left, &item)? == Ordering::Equal {
                    return Ok(Scalar::Bool(true));
                }
            }
            Ok(if saw_null {
                Scalar::Null
            } else {
                Scalar::Bool(false)
            })
        }
        ast::Expression::UnaryOperation {
            expression,
            operator,
        } => {
            let is_null = evaluate(scope, expression)? == Scalar::Null;
            Ok(Scalar::Bool(match operator {
                ast::UnaryOperator::IsNull => is_null,
                ast::UnaryOperator::IsNotNull => !is_null,
            }))
        }
        ast::Expression::FunctionCall { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(scope, arg))
                .collect::<Result<Vec<_>, _>>()?;
            call(function, &args)
        }
        ast::Expression::ColumnReference(ast::ColumnReference::TableColumn {
            table: ast::TableReference::AliasedTable(table),
            name,
        }) if table == scope.alias => {
            let value = scope
                .row
                .get(&name.0)
                .ok_or_else(|| ExecutionError::Source(format!("column {} does not exist", name.0)))?;
            Scalar::from_json(value)
        }
        ast::Expression::Value(value) => Ok(match value {
            ast::Value::Int8(i) => Scalar::Int(*i),
            ast::Value::Float8(f) => Scalar::Float(*f),
            ast::Value::Bool(b) => Scalar::Bool(*b),
            ast::Value::String(s) => Scalar::Text(s.clone()),
            ast::Value::Timestamp(t) => Scalar::Timestamp(*t),
            ast::Value::Null => Scalar::Null,
        }),
        other => Err(unsupported(format!("expression {other:?}"))),
    }
}

fn binary_operation(
    left: &Scalar,
    operator: ast::BinaryOperator,
    right: &Scalar,
) -> Result<Scalar, ExecutionError> {
    if *left == Scalar::Null || *right == Scalar::Null {
        return Ok(Scalar::Null);
    }
    let comparison = |holds: fn(Ordering) -> bool| -> Result<Scalar, ExecutionError> {
        Ok(Scalar::Bool(holds(compare(left, right)?)))
    };
    match operator {
        ast::BinaryOperator::Equals => comparison(Ordering::is_eq),
        ast::BinaryOperator::NotEquals => comparison(Ordering::is_ne),
        ast::BinaryOperator::LessThan => comparison(Ordering::is_lt),
        ast::BinaryOperator::LessThanOrEqualTo => comparison(Ordering::is_le),
        ast::BinaryOperator::GreaterThan => comparison(Ordering::is_gt),
        ast::BinaryOperator::GreaterThanOrEqualTo => comparison(Ordering::is_ge),
        ast::BinaryOperator::Like => like(left, right, false),
        ast::BinaryOperator::CaseInsensitiveLike => like(left, right, true),
        ast::BinaryOperator::Concatenate => Ok(Scalar::Text(format!(
            "{}{}",
            text(left)?,
            text(right)?
        ))),
    }
}

fn call(function: &ast::Function, args: &[Scalar]) -> Result<Scalar, ExecutionError> {
    match (function, args) {
        (ast::Function::Replace, [value, from, to]) => {
            if [value, from, to].contains(&&Scalar::Null) {
                return Ok(Scalar::Null);
            }
            let from = text(from)?;
            let value = text(value)?;
            if from.is_empty() {
                return Ok(Scalar::Text(value.to_string()));
            }
            Ok(Scalar::Text(value.replace(from, text(to)?)))
        }
        _ => Err(unsupported(format!("function {function:?} with {} arguments", args.len()))),
    }
}

fn like(value: &Scalar, pattern: &Scalar, case_insensitive: bool) -> Result<Scalar, ExecutionError> {
    let (value, pattern) = if case_insensitive {
        (text(value)?.to_lowercase(), text(pattern)?.to_lowercase())
    } else {
        (text(value)?.to_string(), text(pattern)?.to_string())
    };
    let value: Vec<char> = value.chars().collect();
    let pattern = parse_pattern(&pattern)?;
    Ok(Scalar::Bool(matches_pattern(&value, &pattern)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    Literal(char),
    AnyChar,
    AnySequence,
}

fn parse_pattern(pattern: &str) -> Result<Vec<PatternToken>, ExecutionError> {
    let mut tokens = vec![];
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => PatternToken::Literal(chars.next().ok_or_else(|| {
                ExecutionError::Source("LIKE pattern must not end with escape character".to_string())
            })?),
            '%' => PatternToken::AnySequence,
            '_' => PatternToken::AnyChar,
            c => PatternToken::Literal(c),
        });
    }
    Ok(tokens)
}

fn matches_pattern(value: &[char], pattern: &[PatternToken]) -> bool {
    // matched[j]: the first i characters of value match the first j tokens
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for (j, token) in pattern.iter().enumerate() {
        matched[j + 1] = matched[j] && *token == PatternToken::AnySequence;
    }
    for c in value {
        let mut next = vec![false; pattern.len() + 1];
        for (j, token) in pattern.iter().enumerate() {
            next[j + 1] = match token {
                PatternToken::Literal(l) => matched[j] && l == c,
                PatternToken::AnyChar => matched[j],
                PatternToken::AnySequence => next[j] || matched[j + 1],
            };
        }
        matched = next;
    }
    matched[pattern.len()]
}

/// Compare two non-null scalars.
fn compare(left: &Scalar, right: &Scalar) -> Result<Ordering, ExecutionError> {
    let incomparable = || unsupported(format!("comparison of {left:?} with {right:?}"));
    match (left, right) {
        (Scalar::Int(l), Scalar::Int(r)) => Ok(l.cmp(r)),
        (Scalar::Int(_) | Scalar::Float(_), Scalar::Int(_) | Scalar::Float(_)) => {
            as_float(left).partial_cmp(&as_float(right)).ok_or_else(incomparable)
        }
        (Scalar::Text(l), Scalar::Text(r)) => Ok(l.cmp(r)),
        (Scalar::Bool(l), Scalar::Bool(r)) => Ok(l.cmp(r)),
        (Scalar::Timestamp(l), Scalar::Timestamp(r)) => Ok(l.cmp(r)),
        (Scalar::Text(l), Scalar::Timestamp(r)) => temporal::parse_date_time(l)
            .map(|l| l.cmp(r))
            .ok_or_else(incomparable),
        (Scalar::Timestamp(l), Scalar::Text(r)) => temporal::parse_date_time(r)
            .map(|r| l.cmp(&r))
            .ok_or_else(incomparable),
        _ => Err(incomparable()),
    }
}

/// Order two sort keys: nulls sort as larger than every value.
fn order(left: &Scalar, right: &Scalar, direction: ast::OrderByDirection) -> Ordering {
    let ascending = match (left, right) {
        (Scalar::Null, Scalar::Null) => Ordering::Equal,
        (Scalar::Null, _) => Ordering::Greater,
        (_, Scalar::Null) => Ordering::Less,
        _ => compare(left, right).unwrap_or(Ordering::Equal),
    };
    match direction {
        ast::OrderByDirection::Asc => ascending,
        ast::OrderByDirection::Desc => ascending.reverse(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_float(scalar: &Scalar) -> f64 {
    match scalar {
        Scalar::Int(i) => *i as f64,
        Scalar::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn text(scalar: &Scalar) -> Result<&str, ExecutionError> {
    match scalar {
        Scalar::Text(s) => Ok(s),
        other => Err(unsupported(format!("{other:?} used as text"))),
    }
}

fn unsupported(what: String) -> ExecutionError {
    ExecutionError::Source(format!("unsupported by the in-memory source: {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like_matches(value: &str, pattern: &str) -> bool {
        like(
            &Scalar::Text(value.to_string()),
            &Scalar::Text(pattern.to_string()),
            false,
        )
        .unwrap()
            == Scalar::Bool(true)
    }

    #[test]
    fn like_follows_wildcards_and_escapes() {
        assert!(like_matches("Berglunds", "B%"));
        assert!(like_matches("Berglunds", "%und%"));
        assert!(like_matches("Berglunds", "_erglunds"));
        assert!(like_matches("", "%"));
        assert!(!like_matches("Berglunds", "b%"));
        assert!(like_matches("50% off", "50\\% off"));
        assert!(!like_matches("500 off", "50\\% off"));
        assert!(like_matches("a_b", "a\\_b"));
        assert!(!like_matches("axb", "a\\_b"));
    }

    #[test]
    fn ilike_ignores_case() {
        assert_eq!(
            like(
                &Scalar::Text("Bólido".to_string()),
                &Scalar::Text("%ÓLI%".to_string()),
                true
            )
            .unwrap(),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn nulls_propagate_through_comparisons() {
        assert_eq!(
            binary_operation(&Scalar::Null, ast::BinaryOperator::Equals, &Scalar::Int(1)).unwrap(),
            Scalar::Null
        );
        assert_eq!(
            binary_operation(&Scalar::Int(1), ast::BinaryOperator::LessThan, &Scalar::Float(1.5))
                .unwrap(),
            Scalar::Bool(true)
        );
    }

    #[test]
    fn text_compares_with_timestamps_as_a_date() {
        let timestamp = temporal::parse_date_time("1994-01-01").unwrap();
        assert_eq!(
            compare(&Scalar::Text("1993-10-17T00:00:00".to_string()), &Scalar::Timestamp(timestamp))
                .unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn nulls_sort_last_ascending_and_first_descending() {
        let mut values = vec![Scalar::Text("b".into()), Scalar::Null, Scalar::Text("a".into())];
        values.sort_by(|l, r| order(l, r, ast::OrderByDirection::Asc));
        assert_eq!(values.last(), Some(&Scalar::Null));
        values.sort_by(|l, r| order(l, r, ast::OrderByDirection::Desc));
        assert_eq!(values.first(), Some(&Scalar::Null));
    }
}
