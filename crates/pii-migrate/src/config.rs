//! Configuration loading and validation for the PII migration job.

use std::time::Duration;

use anyhow::{Context, Result};
use gateway::db::PoolSettings;
use gateway::secrets::{SecretSettings, SecretSourceKind};
use serde::Deserialize;

/// Validated migration configuration. Secret fields share their names and
/// defaults with the gateway, so both binaries can run from one environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub secret_source: SecretSourceKind,

    #[serde(default = "default_encryption_key_secret_id")]
    pub encryption_key_secret_id: String,

    #[serde(default = "default_db_secret_id")]
    pub db_secret_id: String,

    #[serde(default)]
    pub encryption_key_secret_json: Option<String>,

    #[serde(default)]
    pub db_credentials_secret_json: Option<String>,

    #[serde(default)]
    pub secrets_manager_endpoint_url: Option<String>,

    #[serde(default)]
    pub db_ssl_root_cert: Option<String>,

    /// Report what would change without writing.
    #[serde(default)]
    pub dry_run: bool,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_encryption_key_secret_id() -> String {
    "kidtracker/encryption-key".into()
}
fn default_db_secret_id() -> String {
    "kidtracker/db-credentials".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build pii-migrate configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise pii-migrate configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.encryption_key_secret_id.trim().is_empty() {
            anyhow::bail!("ENCRYPTION_KEY_SECRET_ID is required and must not be empty");
        }
        if self.db_secret_id.trim().is_empty() {
            anyhow::bail!("DB_SECRET_ID is required and must not be empty");
        }
        if self.secret_source == SecretSourceKind::Static
            && (self.encryption_key_secret_json.is_none() || self.db_credentials_secret_json.is_none())
        {
            anyhow::bail!(
                "ENCRYPTION_KEY_SECRET_JSON and DB_CREDENTIALS_SECRET_JSON are required when SECRET_SOURCE=static"
            );
        }
        Ok(())
    }

    pub fn secret_settings(&self) -> SecretSettings {
        SecretSettings {
            kind: self.secret_source,
            encryption_key_secret_id: self.encryption_key_secret_id.clone(),
            db_secret_id: self.db_secret_id.clone(),
            encryption_key_secret_json: self.encryption_key_secret_json.clone(),
            db_credentials_secret_json: self.db_credentials_secret_json.clone(),
            secrets_manager_endpoint_url: self.secrets_manager_endpoint_url.clone(),
        }
    }

    /// A small pool: the job issues one statement at a time.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: 2,
            idle_timeout: Duration::from_secs(30),
            ssl_root_cert: self.db_ssl_root_cert.clone(),
        }
    }
}
