//! Configuration loading and validation for the gateway service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::db::PoolSettings;
use crate::secrets::{SecretSettings, SecretSourceKind};

/// Validated gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Where secrets come from: `secrets_manager` or `static`.
    #[serde(default)]
    pub secret_source: SecretSourceKind,

    /// Secret id of the field encryption key (`{"key": "<hex>"}`).
    #[serde(default = "default_encryption_key_secret_id")]
    pub encryption_key_secret_id: String,

    /// Secret id of the database credentials.
    #[serde(default = "default_db_secret_id")]
    pub db_secret_id: String,

    /// Key secret JSON for the `static` source.
    #[serde(default)]
    pub encryption_key_secret_json: Option<String>,

    /// Database credentials JSON for the `static` source.
    #[serde(default)]
    pub db_credentials_secret_json: Option<String>,

    /// Secrets Manager endpoint override (e.g. LocalStack).
    #[serde(default)]
    pub secrets_manager_endpoint_url: Option<String>,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_idle_timeout")]
    pub db_idle_timeout_secs: u64,

    /// CA bundle for the database server certificate. When set, TLS is
    /// required and verified.
    #[serde(default)]
    pub db_ssl_root_cert: Option<String>,

    /// Table registry file. The registry compiled into the binary is used when unset.
    #[serde(default)]
    pub registry_path: Option<String>,

    /// How often (seconds) to reload the registry file.
    #[serde(default = "default_registry_refresh_interval")]
    pub registry_refresh_interval_secs: u64,

    /// Stripe webhook signing secret; the webhook answers 501 without it.
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,

    /// OTLP gRPC endpoint. Spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    3001
}
pub(crate) fn default_encryption_key_secret_id() -> String {
    "kidtracker/encryption-key".into()
}
pub(crate) fn default_db_secret_id() -> String {
    "kidtracker/db-credentials".into()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_idle_timeout() -> u64 {
    30
}
fn default_registry_refresh_interval() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.encryption_key_secret_id, "ENCRYPTION_KEY_SECRET_ID")?;
        ensure_non_empty(&self.db_secret_id, "DB_SECRET_ID")?;
        if self.secret_source == SecretSourceKind::Static {
            ensure_present(&self.encryption_key_secret_json, "ENCRYPTION_KEY_SECRET_JSON")?;
            ensure_present(&self.db_credentials_secret_json, "DB_CREDENTIALS_SECRET_JSON")?;
        }
        if self.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be > 0");
        }
        if self.registry_refresh_interval_secs == 0 {
            anyhow::bail!("REGISTRY_REFRESH_INTERVAL_SECS must be > 0");
        }
        if let Some(secret) = &self.stripe_webhook_secret {
            ensure_non_empty(secret, "STRIPE_WEBHOOK_SECRET")?;
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

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            idle_timeout: Duration::from_secs(self.db_idle_timeout_secs),
            ssl_root_cert: self.db_ssl_root_cert.clone(),
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

fn ensure_present(value: &Option<String>, name: &str) -> Result<()> {
    match value {
        Some(v) => ensure_non_empty(v, name),
        None => anyhow::bail!("{name} is required when SECRET_SOURCE=static"),
    }
}
