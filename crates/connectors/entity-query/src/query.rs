//! Run an entity query end to end: translate it, execute the plan and stream records.

use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::{info_span, Instrument};

use entity_query_configuration::Configuration;
use query_engine_execution::mapping::EntityRecord;
use query_engine_execution::metrics::Metrics;
use query_engine_execution::source::RowSource;
use query_engine_translation::translation;
use query_engine_translation::translation::request::QueryDescriptor;

/// The records of a query. Errors end the stream.
pub type RecordStream = BoxStream<'static, Result<EntityRecord, QueryError>>;

/// Anything that can go wrong with a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Translation(#[from] translation::error::Error),
    #[error("{0}")]
    Execution(#[from] query_engine_execution::error::Error),
}

/// Translate a query and start executing it against a row source.
///
/// Translation failures are returned before the row source is touched. Failures while
/// fetching or mapping rows arrive as the last item of the stream.
pub async fn query<S: RowSource + ?Sized>(
    configuration: &Configuration,
    metrics: &Metrics,
    source: &S,
    descriptor: &QueryDescriptor,
) -> Result<RecordStream, QueryError> {
    let plan = async { translation::query::translate(&configuration.metadata, descriptor) }
        .instrument(info_span!("Plan query", entity_type = %descriptor.entity_type))
        .await
        .map_err(|err| {
            metrics.record_translation_failure();
            QueryError::Translation(err)
        })?;

    tracing::debug!(plan = %plan.explain(), "Query plan");

    let span = info_span!("Execute query", entity_type = %plan.entity_type);
    let records = span.in_scope(|| query_engine_execution::query::execute(source, plan));
    metrics.record_successful_query();

    let metrics = metrics.clone();
    let mut records = records.map(move |record| match record {
        Ok(record) => {
            metrics.record_returned_record();
            Ok(record)
        }
        Err(err) => {
            metrics.record_execution_failure();
            tracing::error!(
                meta.signal_type = "log",
                event.domain = "entity_query",
                event.name = "Execution error",
                name = "Execution error",
                body = %err,
                error = true,
            );
            Err(QueryError::Execution(err))
        }
    });

    // rows are fetched and mapped while the stream is polled
    Ok(Box::pin(stream::poll_fn(move |cx| {
        let _entered = span.enter();
        records.poll_next_unpin(cx)
    })))
}

/// Read a query from an OData-style URI and run it.
pub async fn query_uri<S: RowSource + ?Sized>(
    configuration: &Configuration,
    metrics: &Metrics,
    source: &S,
    uri: &str,
) -> Result<RecordStream, QueryError> {
    let descriptor = translation::uri::parse_query_uri(uri).map_err(|err| {
        metrics.record_translation_failure();
        QueryError::Translation(err)
    })?;
    query(configuration, metrics, source, &descriptor).await
}
