//! Read a query descriptor from an OData style query uri, as produced by entity query
//! client libraries:
//!
//! `Customers?$filter=(startswith(CompanyName,'B') eq true)&$orderby=City desc&$top=2`
//!
//! Only the subset of the query language that maps to a single entity type is accepted:
//! no `$expand`, no navigation paths, no key lookups.

use std::borrow::Cow;
use std::collections::BTreeSet;

use logos::Logos;
use percent_encoding::percent_decode_str;

use query_engine_metadata::metadata::{temporal, ComparisonOperator, StringFunction, UnknownOperator};

use super::error::Error;
use super::request::{OrderByItem, OrderDirection, Operand, PredicateNode, QueryDescriptor, Selection};

/// Parse a query uri into a query descriptor.
///
/// The resource is the last path segment, so both `Customers?...` and
/// `/breeze/Northwind/Customers?...` address `Customers`. Query parameters not starting
/// with `$` are application specific and ignored.
pub fn parse_query_uri(uri: &str) -> Result<QueryDescriptor, Error> {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let mut descriptor = QueryDescriptor::new(parse_resource(path)?);

    let mut seen_options = BTreeSet::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?;
        let value = decode(value)?;
        if !key.starts_with('$') {
            continue;
        }
        if !seen_options.insert(key.clone()) {
            return Err(Error::InvalidUri(format!(
                "query option '{key}' is given more than once"
            )));
        }
        match key.as_str() {
            "$filter" => {
                descriptor.predicate = Some(parse_filter(&descriptor.entity_type, &value)?);
            }
            "$orderby" => descriptor.order_by = parse_order_by(&value)?,
            "$select" => descriptor.select = parse_select(&value)?,
            "$skip" => descriptor.skip = Some(parse_count("skip", &value)?),
            "$top" => descriptor.take = Some(parse_count("take", &value)?),
            "$inlinecount" if value.trim() == "none" => {}
            "$inlinecount" => {
                return Err(Error::UnsupportedQueryOption(format!("{key}={value}")));
            }
            _ => return Err(Error::UnsupportedQueryOption(key)),
        }
    }

    Ok(descriptor)
}

/// Parse the expression language of `$filter` into a predicate.
///
/// `resource` only appears in error messages.
pub fn parse_filter(resource: &str, input: &str) -> Result<PredicateNode, Error> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::InvalidUri("$filter is empty".to_string()));
    }
    let mut parser = Parser {
        resource,
        tokens,
        position: 0,
    };
    let term = parser.parse_or()?;
    match parser.peek() {
        None => into_predicate(term),
        Some(token) => Err(Error::InvalidUri(format!(
            "unexpected {token} in $filter"
        ))),
    }
}

fn decode(component: &str) -> Result<String, Error> {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| Error::InvalidUri(format!("'{component}' is not valid utf-8")))
}

fn parse_resource(path: &str) -> Result<String, Error> {
    let path = decode(path)?;
    let path = path.trim().trim_matches('/');
    if path.contains('(') {
        return Err(Error::UnsupportedQueryOption(format!(
            "navigation path '{path}'"
        )));
    }
    let resource = path.rsplit('/').next().unwrap_or(path);
    if resource.is_empty() || !resource.chars().all(is_identifier_char) {
        return Err(Error::InvalidUri(format!(
            "'{path}' does not name a resource"
        )));
    }
    Ok(resource.to_string())
}

fn parse_select(value: &str) -> Result<Selection, Error> {
    let mut properties = vec![];
    for item in value.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        if item == "*" {
            return Ok(Selection::All);
        }
        properties.push(property_path(item)?);
    }
    Ok(Selection::Properties(properties))
}

fn parse_order_by(value: &str) -> Result<Vec<OrderByItem>, Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let mut words = item.split_whitespace();
            let property = words.next().unwrap_or(item);
            let direction = match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => OrderDirection::Asc,
                Some("desc") => OrderDirection::Desc,
                Some(other) => {
                    return Err(Error::InvalidUri(format!(
                        "unknown sort direction '{other}'"
                    )))
                }
            };
            if words.next().is_some() {
                return Err(Error::InvalidUri(format!("invalid $orderby item '{item}'")));
            }
            Ok(OrderByItem {
                property: property_path(property)?,
                direction,
            })
        })
        .collect()
}

/// `$skip` and `$top` must be integers. Range checks happen when the plan is built.
fn parse_count(parameter: &'static str, value: &str) -> Result<i64, Error> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidPagination {
            parameter,
            value: value.to_string(),
        })
}

fn property_path(path: &str) -> Result<String, Error> {
    if path.contains('/') {
        Err(Error::UnsupportedQueryOption(format!(
            "navigation path '{path}'"
        )))
    } else if path.is_empty() || !path.chars().all(is_identifier_char) {
        Err(Error::InvalidUri(format!("'{path}' is not a property name")))
    } else {
        Ok(path.to_string())
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// Tokens //

#[derive(Debug, Clone, PartialEq, Default)]
enum LexError {
    #[default]
    UnexpectedInput,
    InvalidLiteral(String),
}

/// Tokens of the `$filter` language. Keywords and operators lex as identifiers, since
/// they are matched case-insensitively by the parser.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(error = LexError)]
enum Token {
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token(",")]
    Comma,

    // paths lex as one identifier so that they can be rejected by name
    #[regex(r"[A-Za-z_][A-Za-z0-9_./]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // a doubled quote is a quote
    #[regex(r"'([^']|'')*'", |lex| unquote(lex.slice()))]
    String(String),

    // `m` and `d` are decimals, `f` a float, `L` a long
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?[mMdDfFlL]?", number)]
    Number(serde_json::Number),

    /// `datetime'...'` and `datetimeoffset'...'`
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*'([^']|'')*'", typed_literal)]
    DateTime(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LeftParen => write!(f, "'('"),
            Token::RightParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Identifier(name) => write!(f, "'{name}'"),
            Token::String(s) => write!(f, "string '{s}'"),
            Token::Number(n) => write!(f, "number {n}"),
            Token::DateTime(s) => write!(f, "datetime '{s}'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
    Token::lexer(input)
        .spanned()
        .map(|(token, span)| {
            token.map_err(|error| match error {
                LexError::InvalidLiteral(message) => Error::InvalidUri(message),
                LexError::UnexpectedInput => Error::InvalidUri(format!(
                    "unexpected '{}' in $filter",
                    input.get(span).unwrap_or_default()
                )),
            })
        })
        .collect()
}

fn unquote(quoted: &str) -> String {
    quoted
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .unwrap_or(quoted)
        .replace("''", "'")
}

fn number(lex: &mut logos::Lexer<Token>) -> Result<serde_json::Number, LexError> {
    let text = lex.slice();
    let (digits, suffix) = match text.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&text[..i], Some(c)),
        _ => (text, None),
    };
    let fractional = digits.contains(|c| matches!(c, '.' | 'e' | 'E'))
        || matches!(suffix, Some('m' | 'M' | 'd' | 'D' | 'f' | 'F'));

    let number = if fractional {
        digits
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
    } else {
        digits.parse::<i64>().ok().map(serde_json::Number::from)
    };
    number.ok_or_else(|| LexError::InvalidLiteral(format!("number '{digits}' is out of range")))
}

fn typed_literal(lex: &mut logos::Lexer<Token>) -> Result<String, LexError> {
    let text = lex.slice();
    let (prefix, quoted) = text.split_at(text.find('\'').unwrap_or(text.len()));
    if !(prefix.eq_ignore_ascii_case("datetime") || prefix.eq_ignore_ascii_case("datetimeoffset"))
    {
        return Err(LexError::InvalidLiteral(format!(
            "unsupported literal type '{prefix}'"
        )));
    }
    let value = unquote(quoted);
    if temporal::parse_date_time(&value).is_none() {
        return Err(LexError::InvalidLiteral(format!(
            "invalid {prefix} literal '{value}'"
        )));
    }
    Ok(value)
}

// Parsing //

/// An intermediate result of parsing: a condition, or an operand of a comparison.
#[derive(Debug)]
enum Term {
    Predicate(PredicateNode),
    Property(String),
    Literal(serde_json::Value),
}

struct Parser<'a> {
    resource: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Identifier(name)) if name.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: &Token) -> Result<(), Error> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(Error::InvalidUri(format!(
                "expected {expected} but found {token} in $filter"
            ))),
            None => Err(Error::InvalidUri(format!(
                "expected {expected} at the end of $filter"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Term, Error> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.position += 1;
            let right = self.parse_and()?;
            left = Term::Predicate(into_predicate(left)?.or(into_predicate(right)?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Term, Error> {
        let mut left = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.position += 1;
            let right = self.parse_unary()?;
            left = Term::Predicate(into_predicate(left)?.and(into_predicate(right)?));
        }
        Ok(left)
    }

    /// `not` applies to the comparison that follows it.
    fn parse_unary(&mut self) -> Result<Term, Error> {
        if self.peek_keyword("not") {
            self.position += 1;
            let inner = self.parse_unary()?;
            Ok(Term::Predicate(!into_predicate(inner)?))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Term, Error> {
        let left = self.parse_primary()?;
        let Some(Token::Identifier(name)) = self.peek() else {
            return Ok(left);
        };
        match comparison_operator(name) {
            Some(operator) => {
                self.position += 1;
                let right = self.parse_primary()?;
                build_comparison(left, operator, right)
            }
            // an operand follows, so this was meant as an operator
            None if !is_junction(name) && self.operand_follows() => {
                Err(Error::UnsupportedOperator {
                    entity_type: self.resource.to_string(),
                    operator: name.clone(),
                    reason: "unknown comparison operator".to_string(),
                })
            }
            None => Ok(left),
        }
    }

    fn operand_follows(&self) -> bool {
        !matches!(
            self.tokens.get(self.position + 1),
            None | Some(Token::RightParen | Token::Comma)
        )
    }

    fn parse_primary(&mut self) -> Result<Term, Error> {
        match self.next() {
            Some(Token::LeftParen) => {
                let term = self.parse_or()?;
                self.expect(&Token::RightParen)?;
                Ok(term)
            }
            Some(Token::String(s) | Token::DateTime(s)) => {
                Ok(Term::Literal(serde_json::Value::String(s)))
            }
            Some(Token::Number(n)) => Ok(Term::Literal(serde_json::Value::Number(n))),
            Some(Token::Identifier(name)) if self.peek() == Some(&Token::LeftParen) => {
                self.position += 1;
                let arguments = self.parse_arguments()?;
                self.function_call(&name, arguments)
            }
            Some(Token::Identifier(name)) => match name.to_ascii_lowercase().as_str() {
                "true" => Ok(Term::Literal(serde_json::Value::Bool(true))),
                "false" => Ok(Term::Literal(serde_json::Value::Bool(false))),
                "null" => Ok(Term::Literal(serde_json::Value::Null)),
                _ => Ok(Term::Property(property_path(&name)?)),
            },
            Some(token) => Err(Error::InvalidUri(format!(
                "unexpected {token} in $filter"
            ))),
            None => Err(Error::InvalidUri(
                "unexpected end of $filter".to_string(),
            )),
        }
    }

    /// Arguments after the opening parenthesis, up to and including the closing one.
    fn parse_arguments(&mut self) -> Result<Vec<Term>, Error> {
        let mut arguments = vec![];
        if self.peek() == Some(&Token::RightParen) {
            self.position += 1;
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_or()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RightParen) => return Ok(arguments),
                Some(token) => {
                    return Err(Error::InvalidUri(format!(
                        "unexpected {token} in function arguments"
                    )))
                }
                None => {
                    return Err(Error::InvalidUri(
                        "unterminated function call in $filter".to_string(),
                    ))
                }
            }
        }
    }

    fn function_call(&self, name: &str, arguments: Vec<Term>) -> Result<Term, Error> {
        // substringof(needle, haystack)
        let (function, reversed) = if name.eq_ignore_ascii_case("substringof") {
            (StringFunction::Contains, true)
        } else {
            let function = name.parse::<StringFunction>().map_err(|UnknownOperator(name)| {
                Error::UnsupportedOperator {
                    entity_type: self.resource.to_string(),
                    operator: name,
                    reason: "unknown function".to_string(),
                }
            })?;
            (function, false)
        };

        let mut arguments = arguments.into_iter();
        let (first, second) = match (arguments.next(), arguments.next(), arguments.next()) {
            (Some(first), Some(second), None) => (first, second),
            _ => {
                return Err(Error::InvalidUri(format!(
                    "'{name}' takes two arguments"
                )))
            }
        };
        let (subject, operand) = if reversed {
            (second, first)
        } else {
            (first, second)
        };

        let Term::Property(property) = subject else {
            return Err(Error::InvalidUri(format!(
                "'{name}' must be applied to a property"
            )));
        };
        let operand = match operand {
            Term::Property(name) => Operand::Property { name },
            Term::Literal(value) => Operand::Literal { value },
            Term::Predicate(_) => {
                return Err(Error::InvalidUri(format!(
                    "a condition is not a valid argument of '{name}'"
                )))
            }
        };

        Ok(Term::Predicate(PredicateNode::string_function(
            function, property, operand,
        )))
    }
}

fn comparison_operator(keyword: &str) -> Option<ComparisonOperator> {
    match keyword.to_ascii_lowercase().as_str() {
        "eq" => Some(ComparisonOperator::Equals),
        "ne" => Some(ComparisonOperator::NotEquals),
        "lt" => Some(ComparisonOperator::LessThan),
        "le" => Some(ComparisonOperator::LessThanOrEqualTo),
        "gt" => Some(ComparisonOperator::GreaterThan),
        "ge" => Some(ComparisonOperator::GreaterThanOrEqualTo),
        _ => None,
    }
}

fn is_junction(keyword: &str) -> bool {
    keyword.eq_ignore_ascii_case("and") || keyword.eq_ignore_ascii_case("or")
}

fn build_comparison(
    left: Term,
    operator: ComparisonOperator,
    right: Term,
) -> Result<Term, Error> {
    let is_equality = matches!(
        operator,
        ComparisonOperator::Equals | ComparisonOperator::NotEquals
    );
    match (left, right) {
        // startswith(p, 'x') eq true
        (Term::Predicate(predicate), Term::Literal(serde_json::Value::Bool(b)))
        | (Term::Literal(serde_json::Value::Bool(b)), Term::Predicate(predicate))
            if is_equality =>
        {
            let holds = (operator == ComparisonOperator::Equals) == b;
            Ok(Term::Predicate(if holds { predicate } else { !predicate }))
        }
        (Term::Property(property), Term::Literal(value)) => Ok(Term::Predicate(
            PredicateNode::compare(property, operator, Operand::Literal { value }),
        )),
        (Term::Property(property), Term::Property(name)) => Ok(Term::Predicate(
            PredicateNode::compare(property, operator, Operand::Property { name }),
        )),
        // 5 lt Freight is Freight gt 5
        (Term::Literal(value), Term::Property(property)) => {
            let converse = operator.converse().ok_or_else(|| {
                Error::InvalidUri(format!("'{operator}' cannot take a literal on the left"))
            })?;
            Ok(Term::Predicate(PredicateNode::compare(
                property,
                converse,
                Operand::Literal { value },
            )))
        }
        _ => Err(Error::InvalidUri(format!(
            "'{operator}' needs a property on one side"
        ))),
    }
}

/// A bare boolean property is a condition on its own.
fn into_predicate(term: Term) -> Result<PredicateNode, Error> {
    match term {
        Term::Predicate(predicate) => Ok(predicate),
        Term::Property(property) => Ok(PredicateNode::compare(
            property,
            ComparisonOperator::Equals,
            Operand::literal(true),
        )),
        Term::Literal(value) => Err(Error::InvalidUri(format!(
            "the literal {value} is not a condition"
        ))),
    }
}
