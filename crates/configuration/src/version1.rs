//! Version 1 of the configuration format, as written to `configuration.json`.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use query_engine_metadata::metadata;

use crate::environment::Variable;
use crate::error::{ParseConfigurationError, WriteParsedConfigurationError};
use crate::values::{ConnectionUri, PoolSettings, Secret};

pub const CURRENT_VERSION: u32 = 1;
pub const CONFIGURATION_FILENAME: &str = "configuration.json";
pub const CONFIGURATION_JSONSCHEMA_FILENAME: &str = "schema.json";
pub const DEFAULT_CONNECTION_URI_VARIABLE: &str = "CONNECTION_URI";

/// The configuration as it is stored on disk: how to reach the database, and the
/// entity types served from it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfiguration {
    /// Which version of the configuration format are we using
    pub version: u32,
    /// Connection string for a PostgreSQL database
    pub connection_uri: ConnectionUri,
    #[serde(skip_serializing_if = "PoolSettings::is_default")]
    #[serde(default)]
    pub pool_settings: PoolSettings,
    /// How `startswith`, `endswith` and `contains` compare characters
    #[serde(default)]
    pub string_matching: metadata::StringMatching,
    #[serde(default)]
    pub metadata: metadata::Metadata,
}

impl ParsedConfiguration {
    /// A configuration with no entity types, reading the connection string from the
    /// default environment variable.
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            connection_uri: ConnectionUri(Secret::FromEnvironment {
                variable: Variable::from(DEFAULT_CONNECTION_URI_VARIABLE),
            }),
            pool_settings: PoolSettings::default(),
            string_matching: metadata::StringMatching::default(),
            metadata: metadata::Metadata::empty(),
        }
    }
}

/// Parse the configuration format from a directory.
pub async fn parse_configuration(
    configuration_dir: impl AsRef<Path>,
) -> Result<ParsedConfiguration, ParseConfigurationError> {
    let configuration_file = configuration_dir.as_ref().join(CONFIGURATION_FILENAME);

    let configuration_file_contents =
        fs::read_to_string(&configuration_file)
            .await
            .map_err(|err| {
                ParseConfigurationError::IoErrorButStringified(format!(
                    "{}: {}",
                    &configuration_file.display(),
                    err
                ))
            })?;

    let parsed_config: ParsedConfiguration = serde_json::from_str(&configuration_file_contents)
        .map_err(|error| ParseConfigurationError::ParseError {
            file_path: configuration_file.clone(),
            line: error.line(),
            column: error.column(),
            message: error.to_string(),
        })?;

    if parsed_config.version != CURRENT_VERSION {
        return Err(ParseConfigurationError::UnsupportedVersion {
            file_path: configuration_file,
            version: parsed_config.version,
        });
    }

    if let ConnectionUri(Secret::Plain(uri)) = &parsed_config.connection_uri {
        if uri.is_empty() {
            return Err(ParseConfigurationError::EmptyConnectionUri {
                file_path: configuration_file,
            });
        }
    }

    Ok(parsed_config)
}

/// Write the parsed configuration into a directory on disk, together with the JSON
/// schema describing it.
pub async fn write_parsed_configuration(
    parsed_config: ParsedConfiguration,
    out_dir: impl AsRef<Path>,
) -> Result<(), WriteParsedConfigurationError> {
    let configuration_file = out_dir.as_ref().to_owned().join(CONFIGURATION_FILENAME);
    fs::create_dir_all(out_dir.as_ref()).await?;

    // create the configuration file
    fs::write(
        configuration_file,
        serde_json::to_string_pretty(&parsed_config)? + "\n",
    )
    .await?;

    // create the jsonschema file
    let configuration_jsonschema_file_path = out_dir
        .as_ref()
        .to_owned()
        .join(CONFIGURATION_JSONSCHEMA_FILENAME);

    let output = schemars::schema_for!(ParsedConfiguration);
    fs::write(
        &configuration_jsonschema_file_path,
        serde_json::to_string_pretty(&output)? + "\n",
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use similar_asserts::assert_eq;

    use super::*;

    fn northwind_configuration_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../static/northwind")
    }

    #[tokio::test]
    async fn parses_the_northwind_configuration() {
        let parsed = parse_configuration(northwind_configuration_dir())
            .await
            .unwrap();
        assert_eq!(parsed.version, CURRENT_VERSION);
        assert_eq!(
            parsed.connection_uri,
            ConnectionUri(Secret::FromEnvironment {
                variable: Variable::from(DEFAULT_CONNECTION_URI_VARIABLE)
            })
        );
        assert!(parsed.metadata.entity_types.lookup("Customers").is_some());
        assert_eq!(parsed.metadata.validate(), Ok(()));
    }

    #[tokio::test]
    async fn written_configuration_parses_back() {
        let parsed = parse_configuration(northwind_configuration_dir())
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        write_parsed_configuration(parsed.clone(), dir.path())
            .await
            .unwrap();
        let reparsed = parse_configuration(dir.path()).await.unwrap();

        assert_eq!(parsed, reparsed);
        assert!(dir.path().join(CONFIGURATION_JSONSCHEMA_FILENAME).exists());
    }

    #[tokio::test]
    async fn northwind_configuration_conforms_to_the_schema() {
        let schema = serde_json::to_value(schemars::schema_for!(ParsedConfiguration)).unwrap();
        let compiled = jsonschema::JSONSchema::compile(&schema).unwrap();

        let contents = std::fs::read_to_string(
            northwind_configuration_dir().join(CONFIGURATION_FILENAME),
        )
        .unwrap();
        let configuration: serde_json::Value = serde_json::from_str(&contents).unwrap();

        assert!(compiled.is_valid(&configuration));
    }

    #[tokio::test]
    async fn rejects_an_empty_connection_uri() {
        let dir = tempfile::tempdir().unwrap();
        let mut configuration = ParsedConfiguration::empty();
        configuration.connection_uri = ConnectionUri::from("");
        write_parsed_configuration(configuration, dir.path())
            .await
            .unwrap();

        let error = parse_configuration(dir.path()).await.unwrap_err();
        assert!(matches!(
            error,
            ParseConfigurationError::EmptyConnectionUri { .. }
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_versions() {
        let dir = tempfile::tempdir().unwrap();
        let mut configuration = ParsedConfiguration::empty();
        configuration.version = 2;
        write_parsed_configuration(configuration, dir.path())
            .await
            .unwrap();

        let error = parse_configuration(dir.path()).await.unwrap_err();
        assert!(matches!(
            error,
            ParseConfigurationError::UnsupportedVersion { version: 2, .. }
        ));
    }

    #[tokio::test]
    async fn reports_parse_error_locations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIGURATION_FILENAME),
            "{\n  \"version\": 1,\n  \"connectionUri\": \"postgresql://localhost\",\n}\n",
        )
        .unwrap();

        match parse_configuration(dir.path()).await.unwrap_err() {
            ParseConfigurationError::ParseError { line, .. } => assert_eq!(line, 4),
            other => panic!("expected a parse error, got {other}"),
        }
    }
}
