//! The incoming entity query: which entity type, which rows, which properties,
//! in what order, and which page.

use serde::{Deserialize, Serialize};

use query_engine_metadata::metadata::{ComparisonOperator, StringFunction};

/// A query against one entity type, expressed in entity property terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    /// The entity type name, or the resource name clients address it by.
    pub entity_type: String,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<PredicateNode>,
    #[serde(default)]
    pub select: Selection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderByItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
}

impl QueryDescriptor {
    /// A query returning every row and every property of an entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        QueryDescriptor {
            entity_type: entity_type.into(),
            predicate: None,
            select: Selection::All,
            order_by: vec![],
            skip: None,
            take: None,
        }
    }

    /// Restrict the rows. Calling this again combines the predicates with `and`.
    #[must_use]
    pub fn filter(mut self, predicate: PredicateNode) -> Self {
        self.predicate = Some(match self.predicate {
            None => predicate,
            Some(existing) => existing.and(predicate),
        });
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Selection::Properties(properties.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn order_by(mut self, property: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push(OrderByItem {
            property: property.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn take(mut self, take: i64) -> Self {
        self.take = Some(take);
        self
    }
}

/// Which properties end up in each result record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selection {
    /// Every declared property, in declaration order.
    #[default]
    All,
    /// The named properties, in the given order.
    Properties(Vec<String>),
}

/// One element of the requested ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderByItem {
    pub property: String,
    #[serde(default)]
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// A boolean expression over the properties of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredicateNode {
    Comparison {
        property: String,
        operator: Operator,
        operand: Operand,
    },
    And {
        left: Box<PredicateNode>,
        right: Box<PredicateNode>,
    },
    Or {
        left: Box<PredicateNode>,
        right: Box<PredicateNode>,
    },
    Not {
        inner: Box<PredicateNode>,
    },
    StringFunction {
        function: StringFunction,
        property: String,
        operand: Operand,
    },
}

impl PredicateNode {
    pub fn compare(
        property: impl Into<String>,
        operator: impl Into<Operator>,
        operand: Operand,
    ) -> Self {
        PredicateNode::Comparison {
            property: property.into(),
            operator: operator.into(),
            operand,
        }
    }

    pub fn string_function(
        function: StringFunction,
        property: impl Into<String>,
        operand: Operand,
    ) -> Self {
        PredicateNode::StringFunction {
            function,
            property: property.into(),
            operand,
        }
    }

    #[must_use]
    pub fn and(self, other: PredicateNode) -> Self {
        PredicateNode::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    #[must_use]
    pub fn or(self, other: PredicateNode) -> Self {
        PredicateNode::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

impl std::ops::Not for PredicateNode {
    type Output = PredicateNode;

    fn not(self) -> PredicateNode {
        PredicateNode::Not {
            inner: Box::new(self),
        }
    }
}

/// A comparison operator as the client spelled it.
///
/// Spellings outside the supported set are kept when the request is read, and
/// translation rejects them with `UnsupportedOperator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Known(ComparisonOperator),
    Unknown(String),
}

impl From<ComparisonOperator> for Operator {
    fn from(operator: ComparisonOperator) -> Self {
        Operator::Known(operator)
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        name.parse().map_or(Operator::Unknown(name), Operator::Known)
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Known(operator) => operator.name().to_string(),
            Operator::Unknown(name) => name,
        }
    }
}

/// The right-hand side of a comparison or string function.
///
/// Whether an operand names another property is always explicit; a string literal
/// that happens to equal a property name is still a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operand {
    Literal { value: serde_json::Value },
    Property { name: String },
}

impl Operand {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Operand::Literal {
            value: value.into(),
        }
    }

    pub fn property(name: impl Into<String>) -> Self {
        Operand::Property { name: name.into() }
    }
}
