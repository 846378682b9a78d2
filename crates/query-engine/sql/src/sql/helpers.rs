//! Helpers for building sql::ast types in certain shapes and patterns.

use super::ast::*;

/// The alias of the subquery the row-to-json wrapper selects from.
pub const ROWS_TABLE_ALIAS: &str = "rows";
/// The alias of the single json column the row-to-json wrapper produces.
pub const ROW_COLUMN_ALIAS: &str = "row";

// Empty clauses //

/// An empty `WHERE` clause.
pub fn empty_where() -> Expression {
    Expression::Value(Value::Bool(true))
}

/// An empty `ORDER BY` clause.
pub fn empty_order_by() -> OrderBy {
    OrderBy { elements: vec![] }
}

/// Empty `LIMIT` and `OFFSET` clauses.
pub fn empty_limit() -> Limit {
    Limit {
        limit: None,
        offset: None,
    }
}

/// A `true` expression.
pub fn true_expr() -> Expression {
    Expression::Value(Value::Bool(true))
}

/// A `false` expression.
pub fn false_expr() -> Expression {
    Expression::Value(Value::Bool(false))
}

// Aliasing //

/// Create column aliases using this function so we build everything in one place.
pub fn make_column_alias(name: String) -> ColumnAlias {
    ColumnAlias { name }
}

/// Create table aliases using this function so we build everything in one place.
pub fn make_table_alias(name: String) -> TableAlias {
    TableAlias { name }
}

// Expressions //

/// `'%' || replace(replace(replace(expression, '\', '\\'), '%', '\%'), '_', '\_') || '%'`
///
/// Builds a LIKE pattern from another expression with that expression's own
/// wildcards escaped, optionally surrounded by `%`.
pub fn like_pattern_from_expression(
    expression: Expression,
    leading_wildcard: bool,
    trailing_wildcard: bool,
) -> Expression {
    let escaped = [("\\", "\\\\"), ("%", "\\%"), ("_", "\\_")]
        .into_iter()
        .fold(expression, |inner, (from, to)| Expression::FunctionCall {
            function: Function::Replace,
            args: vec![
                inner,
                Expression::Value(Value::String(from.to_string())),
                Expression::Value(Value::String(to.to_string())),
            ],
        });
    let wildcard = || Expression::Value(Value::String("%".to_string()));
    let concat = |left, right| Expression::BinaryOperation {
        left: Box::new(left),
        operator: BinaryOperator::Concatenate,
        right: Box::new(right),
    };

    let pattern = if leading_wildcard {
        concat(wildcard(), escaped)
    } else {
        escaped
    };
    if trailing_wildcard {
        concat(pattern, wildcard())
    } else {
        pattern
    }
}

/// Escape the LIKE wildcards of a literal string.
pub fn escape_like_literal(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// SELECTs //

/// Build a simple select with a select list and the rest are empty.
pub fn simple_select(select_list: Vec<(ColumnAlias, Expression)>) -> Select {
    Select {
        select_list: SelectList::SelectList(select_list),
        from: None,
        where_: Where(empty_where()),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// Wrap a select so every row comes back as a single json object keyed by column alias:
///
/// `SELECT row_to_json("rows") AS "row" FROM (<select>) AS "rows"`
///
/// Order and limits stay inside the subquery. Postgres preserves the subquery order
/// for a plain projection like this one.
pub fn select_rows_as_json(select: Select) -> Select {
    let rows_alias = make_table_alias(ROWS_TABLE_ALIAS.to_string());
    let mut wrapper = simple_select(vec![(
        make_column_alias(ROW_COLUMN_ALIAS.to_string()),
        Expression::RowToJson(TableReference::AliasedTable(rows_alias.clone())),
    )]);
    wrapper.from = Some(From::Select {
        select: Box::new(select),
        alias: rows_alias,
    });
    wrapper
}
