//! Metadata information regarding the entity types and the tables that persist them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use enum_iterator::Sequence;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The scalar types an entity property can be declared with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Boolean,
    Int,
    Float,
    String,
    #[serde(alias = "date")]
    DateTime,
}

impl ScalarType {
    const OPERATORS_SUPPORTED_BY_ALL_TYPES: &'static [ComparisonOperator] = &[
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
        ComparisonOperator::In,
    ];

    const ORDERING_OPERATORS: &'static [ComparisonOperator] = &[
        ComparisonOperator::LessThan,
        ComparisonOperator::LessThanOrEqualTo,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterThanOrEqualTo,
    ];

    /// Returns the complete set of comparison operators for the given type.
    pub fn comparison_operators(self) -> BTreeSet<ComparisonOperator> {
        let mut operators =
            BTreeSet::from_iter(Self::OPERATORS_SUPPORTED_BY_ALL_TYPES.iter().copied());
        operators.extend(match self {
            ScalarType::Boolean => [].iter(),
            _ => Self::ORDERING_OPERATORS.iter(),
        });
        operators
    }

    /// String functions are only defined on strings.
    pub fn supports_string_functions(self) -> bool {
        self == ScalarType::String
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// Whether values of the two types can be compared with each other.
    /// Numbers compare across integer and floating point representations.
    pub fn is_comparable_with(self, other: ScalarType) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Boolean => "boolean",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::String => "string",
            ScalarType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

/// The complete list of comparison operators a predicate may use.
/// Not all of these are supported for every type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum ComparisonOperator {
    #[serde(rename = "eq")]
    Equals,
    #[serde(rename = "ne")]
    NotEquals,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "le")]
    LessThanOrEqualTo,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "ge")]
    GreaterThanOrEqualTo,
    #[serde(rename = "in")]
    In,
}

impl ComparisonOperator {
    /// The canonical name of the operator.
    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "eq",
            Self::NotEquals => "ne",
            Self::LessThan => "lt",
            Self::LessThanOrEqualTo => "le",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqualTo => "ge",
            Self::In => "in",
        }
    }

    /// The operator that holds when the operands are swapped:
    /// `a > b` is the same as `b < a`.
    pub fn converse(self) -> Option<Self> {
        match self {
            Self::Equals => Some(Self::Equals),
            Self::NotEquals => Some(Self::NotEquals),
            Self::LessThan => Some(Self::GreaterThan),
            Self::LessThanOrEqualTo => Some(Self::GreaterThanOrEqualTo),
            Self::GreaterThan => Some(Self::LessThan),
            Self::GreaterThanOrEqualTo => Some(Self::LessThanOrEqualTo),
            Self::In => None,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComparisonOperator {
    type Err = UnknownOperator;

    /// Accepts the canonical names as well as the symbolic and long-hand spellings
    /// client query libraries emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" | "==" | "=" | "equals" => Ok(Self::Equals),
            "ne" | "!=" | "<>" | "notequals" => Ok(Self::NotEquals),
            "lt" | "<" | "lessthan" => Ok(Self::LessThan),
            "le" | "<=" | "lessthanorequal" => Ok(Self::LessThanOrEqualTo),
            "gt" | ">" | "greaterthan" => Ok(Self::GreaterThan),
            "ge" | ">=" | "greaterthanorequal" => Ok(Self::GreaterThanOrEqualTo),
            "in" => Ok(Self::In),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// String pattern functions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Sequence,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StringFunction {
    StartsWith,
    EndsWith,
    Contains,
}

impl StringFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for StringFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StringFunction {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "startswith" | "starts_with" => Ok(Self::StartsWith),
            "endswith" | "ends_with" => Ok(Self::EndsWith),
            "contains" => Ok(Self::Contains),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// An operator or function name that is not part of the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

/// How the string functions compare characters.
///
/// This is explicit rather than inherited from whatever collation the database
/// happens to default to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum StringMatching {
    #[default]
    CaseSensitive,
    CaseInsensitive,
}

/// Mapping from an entity type name to its information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct EntityTypes(pub BTreeMap<String, EntityTypeInfo>);

impl EntityTypes {
    pub fn empty() -> Self {
        EntityTypes(BTreeMap::new())
    }

    /// Look up an entity type by its own name or by the resource name clients query it by.
    pub fn lookup(&self, name: &str) -> Option<(&str, &EntityTypeInfo)> {
        self.0
            .get_key_value(name)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(_, info)| info.resource_name.as_deref() == Some(name))
            })
            .map(|(entity_name, info)| (entity_name.as_str(), info))
    }
}

/// Information about an entity type and the table it is persisted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeInfo {
    pub schema_name: String,
    pub table_name: String,
    /// The collection name clients address this entity type by, e.g. `Customers`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    /// Properties making up the entity key. Used for stable default ordering.
    #[serde(default)]
    pub key: Vec<String>,
    /// Declared properties, in declaration order.
    pub properties: IndexMap<String, PropertyInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntityTypeInfo {
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    /// All properties in declaration order.
    pub fn all_properties(&self) -> impl Iterator<Item = (&String, &PropertyInfo)> {
        self.properties.iter()
    }

    /// The key properties. Keys naming undeclared properties are skipped; `validate`
    /// rejects those at load time.
    pub fn key_properties(&self) -> impl Iterator<Item = (&String, &PropertyInfo)> {
        self.key
            .iter()
            .filter_map(|name| self.properties.get_key_value(name))
    }
}

/// Information about an entity property and the column backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub column_name: String,
    pub r#type: ScalarType,
    #[serde(default = "nullable_default")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn nullable_default() -> bool {
    true
}
