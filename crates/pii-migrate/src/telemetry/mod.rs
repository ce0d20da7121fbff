//! Logging for the migration job: structured JSON to stdout, no span export.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the JSON subscriber at `log_level`, unless `RUST_LOG` overrides it.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise pii-migrate logging: {e}"))
}
