//! Execution helpers for [`Statement`]s.
//!
//! Generic over the executor so the same code runs against the pool and
//! inside a transaction (`&mut *tx`).

use serde_json::{Map, Value};
use sqlx::PgExecutor;

use super::statement::Statement;

/// A database row as a JSON object, keyed by column name.
pub type Row = Map<String, Value>;

/// Run a row-returning statement and collect every row.
pub async fn fetch_rows<'c, E>(executor: E, stmt: &Statement) -> Result<Vec<Row>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let mut query = sqlx::query_scalar::<_, Value>(&stmt.sql);
    for param in &stmt.params {
        query = query.bind(param.as_deref());
    }
    query.fetch_all(executor).await?.into_iter().map(into_row).collect()
}

/// Run a row-returning statement that yields at most one row.
pub async fn fetch_optional_row<'c, E>(
    executor: E,
    stmt: &Statement,
) -> Result<Option<Row>, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let mut query = sqlx::query_scalar::<_, Value>(&stmt.sql);
    for param in &stmt.params {
        query = query.bind(param.as_deref());
    }
    query.fetch_optional(executor).await?.map(into_row).transpose()
}

/// Run a statement for its side effect; returns the number of rows affected.
pub async fn execute<'c, E>(executor: E, stmt: &Statement) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'c>,
{
    let mut query = sqlx::query(&stmt.sql);
    for param in &stmt.params {
        query = query.bind(param.as_deref());
    }
    Ok(query.execute(executor).await?.rows_affected())
}

fn into_row(value: Value) -> Result<Row, sqlx::Error> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(sqlx::Error::Decode(
            format!("expected a JSON object row, got {other}").into(),
        )),
    }
}
