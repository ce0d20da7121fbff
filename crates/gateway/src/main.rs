//! `gateway` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise tracing (JSON logs, optional OTLP export).
//! 3. Build the secret source. The key and the pool stay lazy until first use.
//! 4. Load the table registry and, when it comes from a file, spawn its reload task.
//! 5. Build the Axum router and serve until Ctrl-C, then close the pool.

use anyhow::Result;
use tracing::info;

use gateway::config::Config;
use gateway::db::Database;
use gateway::keystore::KeyStore;
use gateway::registry::{self, RegistryCache};
use gateway::secrets::SecretSource;
use gateway::server::{self, state::AppState};
use gateway::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        secret_source = ?cfg.secret_source,
        "gateway starting"
    );

    // -----------------------------------------------------------------------
    // 3. Secrets, key and pool
    // -----------------------------------------------------------------------
    let secrets = SecretSource::connect(&cfg.secret_settings()).await;
    let key_store = KeyStore::new(secrets.clone(), cfg.encryption_key_secret_id.clone());
    let database = Database::new(secrets, cfg.db_secret_id.clone(), cfg.pool_settings());

    // -----------------------------------------------------------------------
    // 4. Registry
    // -----------------------------------------------------------------------
    let registry_cache = RegistryCache::with_registry(registry::load(cfg.registry_path.as_deref()).await?);
    let _registry_refresh = cfg.registry_path.clone().map(|path| {
        registry::refresh_task(path, cfg.registry_refresh_interval_secs, registry_cache.clone())
    });

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(
        key_store,
        database.clone(),
        registry_cache,
        cfg.stripe_webhook_secret.clone(),
    );
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    database.close().await;
    telemetry::shutdown_telemetry();
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
