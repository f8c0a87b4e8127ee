// ============================================================================
// API Gateway Service
// ============================================================================
//
// Single entry point for client requests.
// It handles:
// - Token issuance (/auth/login)
// - JWT verification
// - Per-user, per-route token bucket rate limiting (fail closed)
// - Forwarding admitted requests to the downstream service
// - Rate config administration (/admin/config)
//
// Architecture:
// - Stateless (can scale horizontally)
// - Bucket and config state live in the Shared Token Store (Redis)
//
// ============================================================================

use anyhow::{Context, Result};
use gatekeeper::config::Config;
use gatekeeper::gateway::{GatewayRouter, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let config = Arc::new(config);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== API Gateway Service Starting ===");
    info!("Port: {}", config.port);
    info!("Downstream: {}", config.gateway.backend_service_url);
    info!("Protected prefix: {}", config.gateway.protected_prefix);
    info!("Store backend: {}", config.rate_limit.store_backend);

    // Initialize dependencies
    let store = gatekeeper::connect_store(&config).await?;
    let gateway_state = GatewayRouter::create_state(config.clone(), store)?;

    let app = create_router(gateway_state);

    // Start server
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;

    info!("API Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(gatekeeper::shutdown_signal())
        .await
        .context("Failed to start server")?;

    Ok(())
}
