// ============================================================================
// Rate Limiting
// ============================================================================
//
// Token bucket admission control backed by the Shared Token Store.
//
// - token_bucket: refill / consume arithmetic (pure)
// - store: TokenStore seam (atomic consume + config hash)
// - redis_store: Lua-scripted implementation for production
// - memory_store: single-process implementation for development and tests
// - config_store: per-route {capacity, refillRate} lookup with default fallback
// - limiter: check(identity, route, now, cost) with fail-closed semantics
//
// ============================================================================

pub mod config_store;
pub mod limiter;
pub mod memory_store;
pub mod redis_store;
pub mod store;
pub mod token_bucket;

pub use config_store::RateConfigStore;
pub use limiter::{RateLimitDecision, TokenBucketLimiter};
pub use memory_store::InMemoryTokenStore;
pub use redis_store::RedisTokenStore;
pub use store::{StoreError, TokenStore};
pub use token_bucket::ConsumeOutcome;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in seconds since the Unix epoch, with sub-second precision
pub fn current_time_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Canonical route path for config lookups and bucket keys
///
/// Repeated slashes collapse and a trailing slash is dropped, so
/// `/api//orders/` and `/api/orders` share one bucket.
pub fn normalize_route_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_route_path() {
        assert_eq!(normalize_route_path("/api/orders"), "/api/orders");
        assert_eq!(normalize_route_path("/api/orders/"), "/api/orders");
        assert_eq!(normalize_route_path("/api//orders"), "/api/orders");
        assert_eq!(normalize_route_path("//api///orders//"), "/api/orders");
        assert_eq!(normalize_route_path("api/orders"), "/api/orders");
        assert_eq!(normalize_route_path("/"), "/");
        assert_eq!(normalize_route_path("//"), "/");
    }
}
