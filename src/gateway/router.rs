// ============================================================================
// Gateway Router
// ============================================================================
//
// Routing rules:
// - POST /auth/login          → token issuance (public)
// - GET|POST /admin/config    → rate config admin (verify only)
// - /health, /health/ready    → probes (public)
// - /metrics                  → Prometheus exposition (public)
// - {protected_prefix}/*      → verify → rate limit → forward
//
// ============================================================================

use crate::auth::AuthManager;
use crate::gateway::middleware::require_identity;
use crate::gateway::pipeline::{Pipeline, RequestContext};
use crate::gateway::service_client::ServiceClient;
use crate::gateway::stages::{EnforceRateLimit, ForwardRequest, VerifyIdentity};
use crate::rate_limit::{RateConfigStore, TokenBucketLimiter, TokenStore};
use crate::routes::{admin, auth, health};
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    middleware,
    response::Response,
    routing::{any, get, post},
};
use gatekeeper_config::Config;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Gateway router state
pub struct GatewayState {
    pub config: Arc<Config>,
    pub auth_manager: Arc<AuthManager>,
    pub store: Arc<dyn TokenStore>,
    pub rate_configs: Arc<RateConfigStore>,
    pub limiter: Arc<TokenBucketLimiter>,
    pub service_client: Arc<ServiceClient>,
    pub pipeline: Pipeline,
}

/// Run a protected-route request through the admission pipeline
pub async fn route_request(
    State(state): State<Arc<GatewayState>>,
    request: Request<Body>,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let run = state.pipeline.execute(RequestContext::new(request)).await;

    tracing::debug!(
        method = %method,
        path = %path,
        state = %run.state,
        status = run.response.status().as_u16(),
        "Pipeline finished"
    );
    run.response
}

/// Gateway router builder
pub struct GatewayRouter;

impl GatewayRouter {
    /// Create gateway state around an already-connected Shared Token Store
    pub fn create_state(
        config: Arc<Config>,
        store: Arc<dyn TokenStore>,
    ) -> anyhow::Result<Arc<GatewayState>> {
        let auth_manager = Arc::new(AuthManager::new(&config)?);

        let rate_configs = Arc::new(RateConfigStore::from_config(
            store.clone(),
            &config.rate_limit,
        )?);
        let limiter = Arc::new(TokenBucketLimiter::new(
            store.clone(),
            rate_configs.clone(),
            config.redis_key_prefixes.rate.clone(),
            Duration::from_millis(config.gateway.store_timeout_ms),
        ));
        let service_client = Arc::new(ServiceClient::new(
            config.gateway.backend_service_url.clone(),
            Duration::from_millis(config.gateway.proxy_timeout_ms),
        )?);

        let pipeline = Pipeline::new()
            .with_stage(VerifyIdentity::new(auth_manager.clone()))
            .with_stage(EnforceRateLimit::new(limiter.clone()))
            .with_stage(ForwardRequest::new(service_client.clone()));

        Ok(Arc::new(GatewayState {
            config,
            auth_manager,
            store,
            rate_configs,
            limiter,
            service_client,
            pipeline,
        }))
    }
}

/// Build the HTTP surface of the gateway
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let prefix = state.config.gateway.protected_prefix.clone();

    let admin_routes = Router::new()
        .route(
            "/admin/config",
            get(admin::get_config).post(admin::update_config),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .merge(admin_routes)
        .route(&prefix, any(route_request))
        .route(&format!("{}/*rest", prefix), any(route_request))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}
