//! `pii-migrate`: encrypt legacy plaintext PII in the `children` table.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`](config::Config) from environment variables.
//! 2. Initialise structured JSON logging.
//! 3. Fetch the field key and database credentials from the secret source.
//! 4. Rewrite every row that still holds plaintext PII, then close the pool.

mod config;
mod migrate;
mod telemetry;

use anyhow::{Context, Result};
use gateway::db::Database;
use gateway::keystore;
use gateway::registry::Registry;
use gateway::secrets::SecretSource;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = config::Config::from_env().map_err(|e| {
        eprintln!("ERROR: pii-migrate configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Secrets and database
    // -----------------------------------------------------------------------
    let source = SecretSource::connect(&cfg.secret_settings()).await;
    let key = keystore::fetch_key(&source, &cfg.encryption_key_secret_id)
        .await
        .context("failed to load field encryption key")?;
    let database = Database::new(source, cfg.db_secret_id.as_str(), cfg.pool_settings());
    let registry = Registry::builtin().context("built-in registry is invalid")?;

    // -----------------------------------------------------------------------
    // 4. Migrate
    // -----------------------------------------------------------------------
    let outcome = migrate::run(&database, &registry, &key, cfg.dry_run).await;
    database.close().await;
    let summary = outcome?;

    info!(
        scanned = summary.scanned,
        updated = summary.updated,
        columns = summary.columns,
        dry_run = cfg.dry_run,
        "pii migration complete"
    );
    Ok(())
}
