//! The entry points of the engine: setting it up from a configuration directory, and
//! serving queries with the resulting configuration and state.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info_span, Instrument};

use entity_query_configuration as configuration;
use entity_query_configuration::environment::Environment;
use query_engine_translation::translation::request::QueryDescriptor;

use super::query::{self, QueryError, RecordStream};
use super::state;

pub struct EntityQuery;

impl EntityQuery {
    /// Update any metrics from the state
    ///
    /// Note: some metrics can be updated directly, and do not
    /// need to be updated here. This function can be useful to
    /// query metrics which cannot be updated directly, e.g.
    /// the number of idle connections in a connection pool
    /// can be polled but not updated directly.
    pub fn fetch_metrics(state: &state::State) {
        state.metrics.update_pool_metrics(state.source.pool());
    }

    /// Execute a query
    pub async fn query(
        configuration: &configuration::Configuration,
        state: &state::State,
        descriptor: &QueryDescriptor,
    ) -> Result<RecordStream, QueryError> {
        query::query(configuration, &state.metrics, &state.source, descriptor)
            .await
            .map_err(log_query_error)
    }

    /// Execute a query written as an OData-style URI
    pub async fn query_uri(
        configuration: &configuration::Configuration,
        state: &state::State,
        uri: &str,
    ) -> Result<RecordStream, QueryError> {
        query::query_uri(configuration, &state.metrics, &state.source, uri)
            .await
            .map_err(log_query_error)
    }
}

fn log_query_error(err: QueryError) -> QueryError {
    tracing::error!(
        meta.signal_type = "log",
        event.domain = "entity_query",
        event.name = "Query error",
        name = "Query error",
        body = %err,
        error = true,
    );
    err
}

/// Failures while loading the configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{0}")]
    Parse(#[from] configuration::error::ParseConfigurationError),
    #[error("{0}")]
    MakeRuntime(#[from] configuration::error::MakeRuntimeConfigurationError),
}

pub struct EntityQuerySetup<Env: Environment> {
    environment: Env,
}

impl<Env: Environment> EntityQuerySetup<Env> {
    pub fn new(environment: Env) -> Self {
        Self { environment }
    }

    /// Read the configuration directory and resolve it against the environment,
    /// returning the configuration queries are served with.
    pub async fn parse_configuration(
        &self,
        configuration_dir: impl AsRef<Path> + Send,
    ) -> Result<Arc<configuration::Configuration>, SetupError> {
        // Validation errors are not logged: they describe the configuration, not a
        // failure of the process.
        let parsed_configuration = configuration::parse_configuration(configuration_dir)
            .instrument(info_span!("parse configuration"))
            .await?;

        let runtime_configuration =
            configuration::make_runtime_configuration(parsed_configuration, &self.environment)?;

        Ok(Arc::new(runtime_configuration))
    }

    /// Initialize the in-memory state: the connection pool and the metrics, which are
    /// registered with the given registry.
    pub async fn try_init_state(
        &self,
        configuration: &configuration::Configuration,
        metrics: &mut prometheus::Registry,
    ) -> Result<Arc<state::State>, state::InitializationError> {
        state::create_state(configuration, metrics)
            .instrument(info_span!("Initialise state"))
            .await
            .map(Arc::new)
            .map_err(|err| {
                tracing::error!(
                    meta.signal_type = "log",
                    event.domain = "entity_query",
                    event.name = "Initialization error",
                    name = "Initialization error",
                    body = %err,
                    error = true,
                );
                err
            })
    }
}
