//! Gatekeeper: an API gateway that authenticates requests, rate limits them per
//! (identity, route) with token buckets held in a shared store, and forwards
//! admitted requests to a downstream service.

pub mod auth;
pub mod gateway;
pub mod rate_limit;
pub mod routes;

use anyhow::{Context, Result};
use gatekeeper_config::{Config, StoreBackend};
use rate_limit::{InMemoryTokenStore, RedisTokenStore, TokenStore, current_time_secs};
use std::sync::Arc;
use std::time::Duration;

pub use gatekeeper_config as config;
pub use gatekeeper_error::{AppError, AppResult};

/// How often the in-memory store drops expired buckets
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Connect the Shared Token Store selected by `STORE_BACKEND`
pub async fn connect_store(config: &Config) -> Result<Arc<dyn TokenStore>> {
    match config.rate_limit.store_backend {
        StoreBackend::Redis => {
            let store = RedisTokenStore::connect(
                &config.redis_url,
                config.redis_key_prefixes.rate_config_hash.clone(),
            )
            .await
            .context("Failed to connect to the Shared Token Store")?;
            Ok(Arc::new(store) as Arc<dyn TokenStore>)
        }
        StoreBackend::Memory => {
            tracing::warn!(
                "Using the in-memory token store: buckets are not shared across gateway instances"
            );
            let store = Arc::new(InMemoryTokenStore::new());
            spawn_memory_purge(store.clone());
            Ok(store as Arc<dyn TokenStore>)
        }
    }
}

fn spawn_memory_purge(store: Arc<InMemoryTokenStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            store.purge_expired(current_time_secs()).await;
        }
    });
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received. Shutting down...");
}
