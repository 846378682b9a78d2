//! Transient state used by the engine.
//!
//! This is initialized on startup.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{info_span, Instrument};

use entity_query_configuration::Configuration;
use query_engine_execution::metrics;
use query_engine_execution::postgres::PostgresSource;

/// State for our engine.
#[derive(Debug, Clone)]
pub struct State {
    pub metrics: metrics::Metrics,
    pub source: PostgresSource,
}

/// Create a connection pool and wrap it inside a State.
pub async fn create_state(
    configuration: &Configuration,
    metrics_registry: &mut prometheus::Registry,
) -> Result<State, InitializationError> {
    let metrics = async {
        metrics::Metrics::initialize(metrics_registry).map_err(InitializationError::MetricsError)
    }
    .instrument(info_span!("Setup metrics"))
    .await?;

    let pool = create_pool(configuration)
        .instrument(info_span!("Create connection pool"))
        .await
        .map_err(InitializationError::UnableToCreatePool)?;

    metrics.update_pool_metrics(&pool);

    Ok(State {
        metrics,
        source: PostgresSource::new(pool),
    })
}

/// Create a connection pool with the configured settings.
async fn create_pool(configuration: &Configuration) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool_settings = &configuration.pool_settings;

    PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .acquire_timeout(Duration::from_secs(pool_settings.pool_timeout))
        .idle_timeout(pool_settings.idle_timeout.map(Duration::from_secs))
        .max_lifetime(pool_settings.connection_lifetime.map(Duration::from_secs))
        .connect(&configuration.connection_uri)
        .await
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(sqlx::Error),
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
}
