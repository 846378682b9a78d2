//! Common functions used across test cases.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;

use entity_query::query::{self, QueryError};
use entity_query_configuration::Configuration;
use query_engine_execution::mapping::EntityRecord;
use query_engine_execution::metrics::Metrics;
use query_engine_execution::source::{RowSource, RowStream};
use query_engine_sql::sql::execution_plan::QueryPlan;
use query_engine_translation::translation::request::QueryDescriptor;
use tests_common::memory::InMemorySource;

/// Everything a query needs, backed by the in-memory Northwind tables.
pub struct Northwind {
    pub configuration: Configuration,
    pub metrics: Metrics,
    pub source: CountingSource<InMemorySource>,
}

pub async fn northwind() -> Northwind {
    northwind_with_source(InMemorySource::northwind().unwrap()).await
}

pub async fn northwind_with_source(source: InMemorySource) -> Northwind {
    let configuration = tests_common::deployment::northwind_configuration()
        .await
        .unwrap();
    let mut registry = prometheus::Registry::new();
    let metrics = Metrics::initialize(&mut registry).unwrap();
    Northwind {
        configuration,
        metrics,
        source: CountingSource::new(source),
    }
}

impl Northwind {
    /// Run a query and collect every item of the stream.
    pub async fn run(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<Result<EntityRecord, QueryError>>, QueryError> {
        let records = query::query(&self.configuration, &self.metrics, &self.source, descriptor).await?;
        Ok(records.collect().await)
    }

    /// Run a query that is expected to succeed.
    pub async fn records(&self, descriptor: &QueryDescriptor) -> Vec<EntityRecord> {
        self.run(descriptor)
            .await
            .unwrap()
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// Run a query written as a URI that is expected to succeed.
    pub async fn uri_records(&self, uri: &str) -> Vec<EntityRecord> {
        query::query_uri(&self.configuration, &self.metrics, &self.source, uri)
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// Run a query and read one string property of every record.
    pub async fn strings(&self, descriptor: &QueryDescriptor, property: &str) -> Vec<String> {
        self.records(descriptor)
            .await
            .iter()
            .map(|record| {
                record[property]
                    .as_str()
                    .unwrap_or_else(|| panic!("{property} is not a string in {record:?}"))
                    .to_string()
            })
            .collect()
    }
}

/// Counts how often the row source is asked for rows.
pub struct CountingSource<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<S: RowSource> RowSource for CountingSource<S> {
    fn rows(&self, plan: &QueryPlan) -> RowStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.rows(plan)
    }
}
