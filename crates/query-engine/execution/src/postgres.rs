//! A row source reading from PostgreSQL through a connection pool.

use futures::stream::{self, StreamExt};
use sqlx::Row as _;
use tokio::sync::mpsc;
use tracing::{info_span, Instrument};

use query_engine_sql::sql;

use crate::error::ExecutionError;
use crate::source::{Row, RowSource, RowStream};

/// How many decoded rows may wait for the consumer before fetching pauses.
const ROW_BUFFER_SIZE: usize = 64;

/// Runs query plans against a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: sqlx::PgPool,
}

impl PostgresSource {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

enum FetchState {
    Pending {
        pool: sqlx::PgPool,
        query: sql::string::SQL,
    },
    Receiving(mpsc::Receiver<Result<Row, ExecutionError>>),
}

impl RowSource for PostgresSource {
    fn rows(&self, plan: &sql::execution_plan::QueryPlan) -> RowStream {
        let query = plan.rows_as_json_sql();
        let state = FetchState::Pending {
            pool: self.pool.clone(),
            query,
        };

        let rows = stream::unfold(state, |state| async move {
            let mut receiver = match state {
                FetchState::Pending { pool, query } => spawn_fetch(pool, query),
                FetchState::Receiving(receiver) => receiver,
            };
            let row = receiver.recv().await?;
            Some((row, FetchState::Receiving(receiver)))
        });

        Box::pin(rows)
    }
}

/// Fetch rows on a separate task, forwarding them until the first error or until the
/// receiving side goes away.
fn spawn_fetch(
    pool: sqlx::PgPool,
    query: sql::string::SQL,
) -> mpsc::Receiver<Result<Row, ExecutionError>> {
    let (sender, receiver) = mpsc::channel(ROW_BUFFER_SIZE);

    tokio::spawn(
        async move {
            tracing::info!(
                generated_sql = %query.sql,
                params = ?query.params,
                "Executing query"
            );
            let mut rows = build_query_with_params(&query).fetch(&pool);
            while let Some(row) = rows.next().await {
                let row = row
                    .map_err(ExecutionError::Database)
                    .and_then(|row| decode_row(&row));
                let failed = row.is_err();
                if sender.send(row).await.is_err() || failed {
                    break;
                }
            }
        }
        .instrument(info_span!("Fetch rows")),
    );

    receiver
}

/// Create a SQLx query based on our SQL query and bind our parameters to it.
fn build_query_with_params(
    query: &sql::string::SQL,
) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .params
        .iter()
        .fold(sqlx::query(query.sql.as_str()), |sqlx_query, param| match param {
            sql::string::Param::String(s) => sqlx_query.bind(s.as_str()),
            sql::string::Param::Timestamp(t) => sqlx_query.bind(*t),
        })
}

/// Each row holds a single json column produced by `row_to_json`.
fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Row, ExecutionError> {
    match row.try_get::<serde_json::Value, _>(0)? {
        serde_json::Value::Object(columns) => Ok(columns),
        other => Err(ExecutionError::UnexpectedRowShape(other.to_string())),
    }
}
