// ============================================================================
// Authentication Routes
// ============================================================================
//
// Endpoints:
// - POST /auth/login - Issue a signed identity token for a username
//
// ============================================================================

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::GatewayState;
use gatekeeper_error::AppError;

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
}

/// Response for login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Expiration timestamp (Unix epoch seconds)
    pub expires_at: i64,
}

/// POST /auth/login
/// Issues a token (default TTL 1 hour) whose subject is the username.
/// No credential check beyond a non-blank username.
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let username = body
        .ok()
        .and_then(|Json(request)| request.username)
        .map(|username| username.trim().to_string())
        .filter(|username| !username.is_empty())
        .ok_or_else(|| AppError::validation("Username required"))?;

    let (token, expires_at) = state.auth_manager.create_token(&username)?;

    tracing::info!(username = %username, "Issued identity token");

    Ok((StatusCode::OK, Json(LoginResponse { token, expires_at })))
}
