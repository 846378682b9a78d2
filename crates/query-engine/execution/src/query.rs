//! Execute a query plan and map its rows to entity records.

use futures::future;
use futures::stream::{BoxStream, StreamExt};

use query_engine_sql::sql;

use crate::error::Error;
use crate::mapping::{self, EntityRecord};
use crate::source::RowSource;

/// A lazy, finite stream of records. It ends after the first error.
pub type RecordStream = BoxStream<'static, Result<EntityRecord, Error>>;

/// Run a plan against a row source.
///
/// Nothing happens until the returned stream is polled. Records come back in the order
/// the source produces rows.
pub fn execute<S: RowSource + ?Sized>(
    source: &S,
    plan: sql::execution_plan::QueryPlan,
) -> RecordStream {
    let rows = source.rows(&plan);
    let projection = plan.projection;

    let records = rows.scan(false, move |failed, row| {
        if *failed {
            return future::ready(None);
        }
        let record = row
            .map_err(Error::Execution)
            .and_then(|row| mapping::map_row(&projection, &row).map_err(Error::Mapping));
        *failed = record.is_err();
        future::ready(Some(record))
    });

    Box::pin(records)
}
