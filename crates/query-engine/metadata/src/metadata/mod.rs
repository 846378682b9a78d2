//! Metadata information regarding the entity types and their persisted representation.

pub mod database;
pub mod temporal;

// re-export without modules
pub use database::*;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata information.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub entity_types: EntityTypes,
    /// Taken from the configuration rather than the metadata description.
    #[serde(skip)]
    pub string_matching: StringMatching,
}

impl Metadata {
    pub fn empty() -> Self {
        Metadata {
            entity_types: EntityTypes::empty(),
            string_matching: StringMatching::default(),
        }
    }

    /// Check the loaded description for inconsistencies that would otherwise surface
    /// as confusing per-query failures.
    pub fn validate(&self) -> Result<(), MetadataError> {
        // entity type name or resource name -> the entity type declaring it
        let mut names: BTreeMap<&str, &str> = BTreeMap::new();

        for (entity_name, info) in &self.entity_types.0 {
            if info.properties.is_empty() {
                return Err(MetadataError::NoProperties(entity_name.clone()));
            }
            for key in &info.key {
                if info.property(key).is_none() {
                    return Err(MetadataError::UnknownKeyProperty {
                        entity_type: entity_name.clone(),
                        property: key.clone(),
                    });
                }
            }
            let aliases =
                std::iter::once(entity_name.as_str()).chain(info.resource_name.as_deref());
            for alias in aliases {
                match names.insert(alias, entity_name) {
                    Some(other) if other != entity_name => {
                        return Err(MetadataError::AmbiguousName {
                            name: alias.to_string(),
                            first: other.to_string(),
                            second: entity_name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Inconsistencies found in a metadata description.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("entity type '{0}' declares no properties")]
    NoProperties(String),
    #[error("key property '{property}' of entity type '{entity_type}' is not declared")]
    UnknownKeyProperty {
        entity_type: String,
        property: String,
    },
    #[error("the name '{name}' refers to both '{first}' and '{second}'")]
    AmbiguousName {
        name: String,
        first: String,
        second: String,
    },
}
