//! The seam between query execution and the store that produces rows.

use futures::stream::BoxStream;

use query_engine_sql::sql;

use crate::error::ExecutionError;

/// A row as the store returns it: a json object keyed by column alias.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A lazy stream of rows. Dropping it cancels the fetch.
pub type RowStream = BoxStream<'static, Result<Row, ExecutionError>>;

/// Anything that can run a query plan and hand back its rows.
///
/// Calling `rows` must not do any work by itself; the store is only contacted once the
/// stream is polled.
pub trait RowSource {
    fn rows(&self, plan: &sql::execution_plan::QueryPlan) -> RowStream;
}

impl<S: RowSource + ?Sized> RowSource for &S {
    fn rows(&self, plan: &sql::execution_plan::QueryPlan) -> RowStream {
        (**self).rows(plan)
    }
}

impl<S: RowSource + ?Sized> RowSource for std::sync::Arc<S> {
    fn rows(&self, plan: &sql::execution_plan::QueryPlan) -> RowStream {
        (**self).rows(plan)
    }
}
