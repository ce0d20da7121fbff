//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::db::{Database, PoolSettings};
use crate::keystore::KeyStore;
use crate::registry::RegistryCache;
use crate::secrets::SecretSource;

/// Process-lifetime runtime context.
///
/// Every field is `Arc`-backed, so Axum clones the state per request without
/// copying. The key and the pool are fetched lazily on first use and shared by
/// all clones.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Field encryption key for the `children` PII columns.
    pub key_store: KeyStore,
    /// Lazily connected Postgres pool.
    pub database: Database,
    /// Table allow-list, reloaded in the background.
    pub registry: RegistryCache,
    /// Signing secret for `/api/stripe/webhook`; the webhook answers 501 without it.
    pub stripe_webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        key_store: KeyStore,
        database: Database,
        registry: RegistryCache,
        stripe_webhook_secret: Option<String>,
    ) -> Self {
        Self {
            key_store,
            database,
            registry,
            stripe_webhook_secret: stripe_webhook_secret.map(Arc::from),
        }
    }
}

impl Default for AppState {
    /// Empty registry and no secrets, suitable for tests: the key and the pool
    /// are never obtainable.
    fn default() -> Self {
        Self::new(
            KeyStore::new(SecretSource::empty(), "encryption-key"),
            Database::new(SecretSource::empty(), "db-credentials", PoolSettings::default()),
            RegistryCache::new(),
            None,
        )
    }
}
