// ============================================================================
// Admin Routes
// ============================================================================
//
// Endpoints (bearer token required, no rate limit):
// - GET /admin/config - Every stored route config
// - POST /admin/config - Upsert {path, capacity, refillRate}
//
// ============================================================================

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::auth::Claims;
use crate::config::REQUEST_COST;
use crate::gateway::GatewayState;
use crate::rate_limit::normalize_route_path;
use gatekeeper_error::AppError;
use gatekeeper_types::RateConfig;

/// GET /admin/config
/// Mapping of route path to `{capacity, refillRate}`
pub async fn get_config(
    State(state): State<Arc<GatewayState>>,
) -> Result<impl IntoResponse, AppError> {
    let configs = state.rate_configs.get_all().await?;
    Ok(Json(configs))
}

/// POST /admin/config
/// `capacity` and `refillRate` may be JSON numbers or numeric strings
pub async fn update_config(
    State(state): State<Arc<GatewayState>>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body.map_err(|e| AppError::validation(e.body_text()))?;

    let path = body.get("path").and_then(Value::as_str).map(str::trim);
    let capacity = body.get("capacity").filter(|v| !v.is_null());
    let refill_rate = body.get("refillRate").filter(|v| !v.is_null());

    let (Some(path), Some(capacity), Some(refill_rate)) = (path, capacity, refill_rate) else {
        return Err(AppError::validation("Missing required fields"));
    };
    if path.is_empty() {
        return Err(AppError::validation("Missing required fields"));
    }
    let path = normalize_route_path(path);

    let config = RateConfig::new(
        parse_number(capacity, "capacity")?,
        parse_number(refill_rate, "refillRate")?,
    )
    .map_err(|e| AppError::validation(e.to_string()))?;
    if !config.admits(REQUEST_COST) {
        return Err(AppError::validation(format!(
            "capacity must be at least {} (the cost of one request)",
            REQUEST_COST
        )));
    }

    state.rate_configs.set(&path, config).await?;

    tracing::info!(
        user_id = %claims.sub,
        path = %path,
        capacity = config.capacity,
        refill_rate = config.refill_rate,
        "Rate config updated by admin"
    );

    Ok(Json(json!({
        "message": "Config updated",
        "path": path,
        "config": config,
    })))
}

fn parse_number(value: &Value, field: &str) -> Result<f64, AppError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::validation(format!("{} must be a number", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_numeric_strings() {
        assert_eq!(parse_number(&json!(2), "capacity").unwrap(), 2.0);
        assert_eq!(parse_number(&json!(0.5), "refillRate").unwrap(), 0.5);
        assert_eq!(parse_number(&json!(" 0.5 "), "refillRate").unwrap(), 0.5);
        assert!(parse_number(&json!("fast"), "refillRate").is_err());
        assert!(parse_number(&json!(true), "capacity").is_err());
    }
}
