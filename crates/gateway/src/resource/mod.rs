//! Generic table-by-name CRUD.
//!
//! Every operation resolves the table through the registry, validates the
//! request against it, and only then touches the key or the pool. Rows of the
//! encrypted table have their PII columns sealed before the statement is built
//! and opened after rows come back.

use crate::crypto::{decrypt_row, encrypt_row, ENCRYPTED_TABLE};
use crate::db::{self, statement, Row, StatementError};
use crate::error::ApiError;
use crate::keystore::KeyBytes;
use crate::registry::{Registry, TableSchema};
use crate::server::state::AppState;
use common::ServiceError;

/// `GET /api/{table}`: every row, in the table's registered order.
pub async fn list(state: &AppState, table: &str) -> Result<Vec<Row>, ApiError> {
    let registry = state.registry.load();
    let schema = lookup(&registry, table)?;
    let stmt = statement::select_all(table, schema);
    let key = key_for(state, table).await?;

    let mut rows = db::fetch_rows(state.database.pool().await?, &stmt).await?;
    for row in &mut rows {
        present(schema, key.as_ref(), row);
    }
    Ok(rows)
}

/// `GET /api/{table}/{id}`: the row, or `None` when no row has that id.
pub async fn get(state: &AppState, table: &str, id: &str) -> Result<Option<Row>, ApiError> {
    let registry = state.registry.load();
    let schema = lookup(&registry, table)?;
    let stmt = statement::select_by_id(table, schema, id)?;
    let key = key_for(state, table).await?;

    let mut row = db::fetch_optional_row(state.database.pool().await?, &stmt).await?;
    if let Some(row) = row.as_mut() {
        present(schema, key.as_ref(), row);
    }
    Ok(row)
}

/// `POST /api/{table}`: insert `body` and return the stored row.
pub async fn create(state: &AppState, table: &str, mut body: Row) -> Result<Row, ApiError> {
    let registry = state.registry.load();
    let schema = lookup(&registry, table)?;
    statement::check_columns(table, schema, &body)?;
    let key = key_for(state, table).await?;
    if let Some(key) = &key {
        encrypt_row(&mut body, key.as_bytes())?;
    }

    let stmt = statement::insert(table, schema, &body)?;
    let mut row = db::fetch_optional_row(state.database.pool().await?, &stmt)
        .await?
        .ok_or_else(|| ServiceError::Internal(format!("insert into {table} returned no row")))?;
    present(schema, key.as_ref(), &mut row);
    Ok(row)
}

/// `PUT /api/{table}/{id}`: assign every key of `body`; `None` when no row has that id.
pub async fn update(
    state: &AppState,
    table: &str,
    id: &str,
    mut body: Row,
) -> Result<Option<Row>, ApiError> {
    let registry = state.registry.load();
    let schema = lookup(&registry, table)?;
    statement::check_columns(table, schema, &body)?;
    statement::check_id(table, schema, id)?;
    if body.is_empty() {
        return Err(StatementError::EmptyUpdate(table.to_owned()).into());
    }
    let key = key_for(state, table).await?;
    if let Some(key) = &key {
        encrypt_row(&mut body, key.as_bytes())?;
    }

    let stmt = statement::update(table, schema, id, &body)?;
    let mut row = db::fetch_optional_row(state.database.pool().await?, &stmt).await?;
    if let Some(row) = row.as_mut() {
        present(schema, key.as_ref(), row);
    }
    Ok(row)
}

/// `DELETE /api/{table}/{id}`. Deleting a missing row succeeds.
pub async fn delete(state: &AppState, table: &str, id: &str) -> Result<(), ApiError> {
    let registry = state.registry.load();
    let schema = lookup(&registry, table)?;
    let stmt = statement::delete(table, schema, id)?;
    let affected = db::execute(state.database.pool().await?, &stmt).await?;
    tracing::debug!(table, affected, "delete executed");
    Ok(())
}

pub(crate) fn lookup<'r>(registry: &'r Registry, table: &str) -> Result<&'r TableSchema, ApiError> {
    registry
        .table(table)
        .ok_or_else(|| ApiError::bad_request(format!("unknown table {table}")))
}

/// The field key, fetched only for the encrypted table.
async fn key_for(state: &AppState, table: &str) -> Result<Option<KeyBytes>, ApiError> {
    if table == ENCRYPTED_TABLE {
        Ok(Some(state.key_store.get().await?))
    } else {
        Ok(None)
    }
}

/// Shape a stored row for the caller: open PII envelopes and render JSON
/// columns as text.
pub(crate) fn present(schema: &TableSchema, key: Option<&KeyBytes>, row: &mut Row) {
    if let Some(key) = key {
        decrypt_row(row, key.as_bytes());
    }
    statement::stringify_json_columns(schema, row);
}
