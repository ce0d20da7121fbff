//! [`Database`]: the lazily connected Postgres pool.

use std::{sync::Arc, time::Duration};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Postgres, Transaction,
};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::secrets::{DbCredentials, SecretError, SecretSource};

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

/// Pool sizing and TLS settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    /// CA bundle for server verification. When set, TLS is required and the
    /// server certificate is verified; otherwise TLS is preferred.
    pub ssl_root_cert: Option<String>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            idle_timeout: Duration::from_secs(30),
            ssl_root_cert: None,
        }
    }
}

/// Process-lifetime database handle.
///
/// Credentials are fetched and the pool is built on the first call to
/// [`Database::pool`]; clones share the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<OnceCell<PgPool>>,
    secrets: SecretSource,
    secret_id: Arc<str>,
    settings: PoolSettings,
}

impl Database {
    pub fn new(secrets: SecretSource, secret_id: impl Into<Arc<str>>, settings: PoolSettings) -> Self {
        Self {
            pool: Arc::new(OnceCell::new()),
            secrets,
            secret_id: secret_id.into(),
            settings,
        }
    }

    /// Wrap an already connected pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(OnceCell::new_with(Some(pool))),
            secrets: SecretSource::empty(),
            secret_id: Arc::from(""),
            settings: PoolSettings::default(),
        }
    }

    /// Returns `true` once the pool has been built.
    pub fn is_ready(&self) -> bool {
        self.pool.initialized()
    }

    /// The pool, connecting first if this is the first call.
    ///
    /// # Errors
    ///
    /// Fails if the credentials cannot be fetched or the first connection
    /// cannot be established. Failures are not cached.
    pub async fn pool(&self) -> Result<&PgPool, DbError> {
        self.pool
            .get_or_try_init(|| async {
                let creds: DbCredentials = self.secrets.fetch_json(&self.secret_id).await?;
                let pool = PgPoolOptions::new()
                    .max_connections(self.settings.max_connections)
                    .idle_timeout(Some(self.settings.idle_timeout))
                    .connect_with(connect_options(&creds, &self.settings))
                    .await
                    .map_err(DbError::Connect)?;
                info!(
                    host = %creds.host,
                    database = %creds.database,
                    max_connections = self.settings.max_connections,
                    "database pool connected"
                );
                Ok::<_, DbError>(pool)
            })
            .await
    }

    /// Start a transaction on the pool.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DbError> {
        Ok(self.pool().await?.begin().await?)
    }

    /// Close the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

fn connect_options(creds: &DbCredentials, settings: &PoolSettings) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&creds.host)
        .port(creds.port)
        .database(&creds.database)
        .username(&creds.username)
        .password(&creds.password);
    match &settings.ssl_root_cert {
        Some(path) => options.ssl_mode(PgSslMode::VerifyFull).ssl_root_cert(path),
        None => options.ssl_mode(PgSslMode::Prefer),
    }
}
