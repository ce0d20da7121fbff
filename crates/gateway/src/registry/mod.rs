//! Table registry: the allow-list of tables, columns and column types.
//!
//! # Responsibilities
//!
//! - Load the registry document (YAML) at startup, from `REGISTRY_PATH` or the
//!   copy compiled into the binary.
//! - Reload it from disk on an interval when a path is configured.
//! - Answer "is this table / column allowed, and what type is it" for the
//!   statement builder.
//!
//! # Module invariants
//!
//! - **No database or crypto dependencies.** The registry is pure configuration.

pub mod cache;
pub mod model;

pub use cache::RegistryCache;
pub use model::{
    ColumnType, Direction, OrderBy, Registry, RegistryError, TableSchema, ID_COLUMN,
    RESERVED_NAMES,
};

use anyhow::{Context, Result};
use tokio::time;
use tracing::{info, warn};

/// The registry shipped with the binary.
const BUILTIN_REGISTRY: &str = include_str!("../../registry/tables.yaml");

impl Registry {
    /// Parse the registry compiled into the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled document is itself invalid.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml(BUILTIN_REGISTRY)
    }
}

/// Load the registry from `path`, or the built-in registry when `path` is `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub async fn load(path: Option<&str>) -> Result<Registry> {
    let registry = match path {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read registry file {path}"))?;
            Registry::from_yaml(&text)
                .with_context(|| format!("invalid registry file {path}"))?
        }
        None => Registry::builtin().context("built-in registry is invalid")?,
    };
    info!(tables = registry.len(), source = path.unwrap_or("builtin"), "registry loaded");
    Ok(registry)
}

/// Spawn a background task that periodically reloads the registry from `path`.
///
/// On reload failure the previous registry is retained and a warning is
/// emitted; the service keeps serving with the stale allow-list.
pub fn refresh_task(
    path: String,
    interval_secs: u64,
    cache: RegistryCache,
) -> tokio::task::JoinHandle<()> {
    let interval = std::time::Duration::from_secs(interval_secs);
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // First tick fires immediately; skip it so we don't double-load at startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match load(Some(&path)).await {
                Ok(registry) => cache.replace(registry),
                Err(e) => warn!(error = %e, "registry reload failed; retaining previous registry"),
            }
        }
    })
}
