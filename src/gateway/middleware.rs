// ============================================================================
// Gateway Middleware
// ============================================================================
//
// Reduced chain for admin routes: identity verification only, no rate limit.
// Uses the same AuthManager as the protected-route pipeline.
//
// ============================================================================

use crate::gateway::router::GatewayState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use gatekeeper_error::AppError;
use std::sync::Arc;

/// Verify the bearer credential and expose the claims as a request extension
pub async fn require_identity(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = state.auth_manager.verify_request(request.headers())?;

    tracing::debug!(
        user_id = %claims.sub,
        path = %request.uri().path(),
        "Admin request authenticated"
    );

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
