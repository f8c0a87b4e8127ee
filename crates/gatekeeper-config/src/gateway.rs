// ============================================================================
// Gateway Configuration
// ============================================================================

use crate::constants::*;

/// Downstream target and request bounds for the admission pipeline
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Base URL of the downstream service (no trailing slash)
    pub backend_service_url: String,
    /// Path prefix whose requests go through verify → rate limit → proxy
    pub protected_prefix: String,
    /// Upper bound for one downstream call; exceeding it yields 504
    pub proxy_timeout_ms: u64,
    /// Upper bound for one Shared Token Store call; exceeding it fails closed (500)
    pub store_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend_service_url: DEFAULT_BACKEND_SERVICE_URL.to_string(),
            protected_prefix: DEFAULT_PROTECTED_PREFIX.to_string(),
            proxy_timeout_ms: DEFAULT_PROXY_TIMEOUT_MS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

impl GatewayConfig {
    pub(crate) fn from_env() -> Self {
        let backend_service_url = std::env::var("BACKEND_SERVICE_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND_SERVICE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let protected_prefix = std::env::var("PROTECTED_PREFIX")
            .ok()
            .map(|p| normalize_prefix(&p))
            .unwrap_or_else(|| DEFAULT_PROTECTED_PREFIX.to_string());

        Self {
            backend_service_url,
            protected_prefix,
            proxy_timeout_ms: std::env::var("PROXY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PROXY_TIMEOUT_MS),
            store_timeout_ms: std::env::var("STORE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

/// "/api/" and "api" both become "/api"
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_PROTECTED_PREFIX.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
