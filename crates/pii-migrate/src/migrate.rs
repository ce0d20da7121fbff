//! Encrypt plaintext PII values already stored in `children`.
//!
//! Idempotent: values that are empty, `null`, or already envelope-shaped are
//! left alone, so the job can be re-run after a partial failure.

use anyhow::{Context, Result};
use gateway::crypto::{encrypt_value, is_envelope, CipherError, ENCRYPTED_TABLE, PII_COLUMNS};
use gateway::db::{self, statement, Database, Row};
use gateway::keystore::KeyBytes;
use gateway::registry::{Registry, ID_COLUMN};
use serde_json::Value;
use tracing::{debug, info};

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub scanned: usize,
    pub updated: usize,
    pub columns: usize,
}

/// The PII columns of `row` that still hold plaintext, encrypted under `key`.
///
/// # Errors
///
/// Propagates [`CipherError`] from the cipher.
pub fn pending_updates(row: &Row, key: &[u8]) -> Result<Row, CipherError> {
    let mut updates = Row::new();
    for column in PII_COLUMNS {
        if let Some(Value::String(value)) = row.get(*column) {
            if !value.is_empty() && !is_envelope(value) {
                updates.insert((*column).to_owned(), Value::String(encrypt_value(value, key)?));
            }
        }
    }
    Ok(updates)
}

/// Scan every row of the encrypted table and seal its plaintext PII columns.
///
/// Each row is updated by its own statement. With `dry_run` set nothing is
/// written, but the summary reports what would have been.
pub async fn run(database: &Database, registry: &Registry, key: &KeyBytes, dry_run: bool) -> Result<Summary> {
    let schema = registry
        .table(ENCRYPTED_TABLE)
        .with_context(|| format!("table {ENCRYPTED_TABLE} is not registered"))?;
    let pool = database.pool().await?;

    let rows = db::fetch_rows(pool, &statement::select_all(ENCRYPTED_TABLE, schema)).await?;
    info!(rows = rows.len(), dry_run, "scanning {ENCRYPTED_TABLE}");

    let mut summary = Summary {
        scanned: rows.len(),
        ..Summary::default()
    };
    for row in &rows {
        let id = row_id(row).context("row without a usable id")?;
        let updates = pending_updates(row, key.as_bytes())?;
        if updates.is_empty() {
            debug!(id = %id, "already encrypted or empty; skipping");
            continue;
        }

        if !dry_run {
            let stmt = statement::update(ENCRYPTED_TABLE, schema, &id, &updates)?;
            db::execute(pool, &stmt)
                .await
                .with_context(|| format!("failed to update row {id}"))?;
        }
        info!(id = %id, columns = updates.len(), dry_run, "row encrypted");
        summary.updated += 1;
        summary.columns += updates.len();
    }
    Ok(summary)
}

fn row_id(row: &Row) -> Option<String> {
    match row.get(ID_COLUMN)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
