//! Convert the parsed configuration metadata to internal engine metadata
//! That can be used by the connector at runtime.

use std::path::PathBuf;

use crate::configuration::Configuration;
use crate::environment::Environment;
use crate::error::MakeRuntimeConfigurationError;
use crate::values::{ConnectionUri, Secret};
use crate::version1::{ParsedConfiguration, CONFIGURATION_FILENAME};

/// Resolve the secrets of a parsed configuration and check its metadata, producing the
/// configuration queries are served with.
pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
    environment: impl Environment,
) -> Result<Configuration, MakeRuntimeConfigurationError> {
    let connection_uri = match parsed_config.connection_uri {
        ConnectionUri(Secret::Plain(uri)) => Ok(uri),
        ConnectionUri(Secret::FromEnvironment { variable }) => environment
            .read(&variable)
            .map_err(|error| MakeRuntimeConfigurationError::MissingEnvironmentVariable {
                file_path: PathBuf::from(CONFIGURATION_FILENAME),
                message: error.to_string(),
            }),
    }?;

    let mut metadata = parsed_config.metadata;
    metadata.string_matching = parsed_config.string_matching;
    metadata.validate()?;

    Ok(Configuration {
        metadata,
        pool_settings: parsed_config.pool_settings,
        connection_uri,
    })
}
