//! Token Bucket Limiter
//!
//! `check(identity, route, now, cost)` resolves the route's config, runs the
//! atomic consume against the Shared Token Store and reports the decision.
//! Any store failure, including a call that outlives `store_timeout`, is a
//! limiter failure and the request is rejected (fail closed).

use super::config_store::RateConfigStore;
use super::normalize_route_path;
use super::store::TokenStore;
use super::token_bucket;
use gatekeeper_error::AppError;
use gatekeeper_metrics::RATE_LIMIT_DECISIONS_TOTAL;
use gatekeeper_types::{BucketKeys, Identity, RateConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Outcome of one limiter check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Exact remaining tokens as returned by the atomic procedure
    pub remaining: f64,
    pub config: RateConfig,
}

impl RateLimitDecision {
    /// `X-RateLimit-Limit`: the configured capacity
    pub fn limit_header(&self) -> String {
        self.config.capacity.to_string()
    }

    /// `X-RateLimit-Remaining`: whole tokens left, never negative
    pub fn remaining_header(&self) -> String {
        self.remaining.floor().max(0.0).to_string()
    }

    /// Seconds until `cost` tokens are available; computed from the same
    /// `remaining` value that produced the denial
    pub fn retry_after(&self, cost: f64) -> u64 {
        token_bucket::retry_after_secs(self.remaining, cost, self.config.refill_rate)
    }
}

pub struct TokenBucketLimiter {
    store: Arc<dyn TokenStore>,
    configs: Arc<RateConfigStore>,
    key_prefix: String,
    store_timeout: Duration,
}

impl TokenBucketLimiter {
    pub fn new(
        store: Arc<dyn TokenStore>,
        configs: Arc<RateConfigStore>,
        key_prefix: impl Into<String>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            configs,
            key_prefix: key_prefix.into(),
            store_timeout,
        }
    }

    pub fn configs(&self) -> &Arc<RateConfigStore> {
        &self.configs
    }

    /// Decide admission for one request of `identity` on `route_path`
    ///
    /// The path is normalized first; spellings of the same route share a bucket.
    pub async fn check(
        &self,
        identity: &Identity,
        route_path: &str,
        now: f64,
        cost: f64,
    ) -> Result<RateLimitDecision, AppError> {
        let route_path = normalize_route_path(route_path);
        let config = self.bounded("config lookup", self.configs.get(&route_path)).await?;

        let keys = BucketKeys::new(&self.key_prefix, identity, &route_path);
        let outcome = self
            .bounded("consume", self.store.consume(&keys, &config, now, cost))
            .await?;

        let label = if outcome.allowed { "allowed" } else { "denied" };
        RATE_LIMIT_DECISIONS_TOTAL.with_label_values(&[label]).inc();

        Ok(RateLimitDecision {
            allowed: outcome.allowed,
            remaining: outcome.remaining,
            config,
        })
    }

    async fn bounded<T, E, F>(&self, operation: &str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let failure = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", self.store_timeout.as_millis()),
        };

        RATE_LIMIT_DECISIONS_TOTAL.with_label_values(&["error"]).inc();
        error!(operation = %operation, error = %failure, "Rate limiter store call failed");
        Err(AppError::limiter_unavailable(format!("{}: {}", operation, failure)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::StoreError;
    use crate::rate_limit::{ConsumeOutcome, InMemoryTokenStore};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Store whose every call fails, like an unreachable Redis
    struct UnreachableStore;

    #[async_trait]
    impl TokenStore for UnreachableStore {
        async fn consume(
            &self,
            _: &BucketKeys,
            _: &RateConfig,
            _: f64,
            _: f64,
        ) -> Result<ConsumeOutcome, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn rate_config(&self, _: &str) -> Result<Option<RateConfig>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn rate_configs(&self) -> Result<HashMap<String, RateConfig>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set_rate_config(&self, _: &str, _: &RateConfig) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Store that answers config reads but never completes a consume
    struct HangingStore;

    #[async_trait]
    impl TokenStore for HangingStore {
        async fn consume(
            &self,
            _: &BucketKeys,
            _: &RateConfig,
            _: f64,
            _: f64,
        ) -> Result<ConsumeOutcome, StoreError> {
            std::future::pending().await
        }
        async fn rate_config(&self, _: &str) -> Result<Option<RateConfig>, StoreError> {
            Ok(None)
        }
        async fn rate_configs(&self) -> Result<HashMap<String, RateConfig>, StoreError> {
            Ok(HashMap::new())
        }
        async fn set_rate_config(&self, _: &str, _: &RateConfig) -> Result<(), StoreError> {
            Ok(())
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn limiter_with(store: Arc<dyn TokenStore>) -> TokenBucketLimiter {
        let configs = Arc::new(RateConfigStore::new(
            store.clone(),
            RateConfig::new(10.0, 1.0).unwrap(),
        ));
        TokenBucketLimiter::new(store, configs, "rate:", Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_closed() {
        let limiter = limiter_with(Arc::new(UnreachableStore));

        let err = limiter
            .check(&Identity::new("alice"), "/api/orders", 1_000.0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LimiterUnavailable(_)));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[tokio::test]
    async fn test_hung_store_fails_closed() {
        let limiter = limiter_with(Arc::new(HangingStore));

        let err = limiter
            .check(&Identity::new("alice"), "/api/orders", 1_000.0, 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LimiterUnavailable(_)));
    }

    #[tokio::test]
    async fn test_route_config_scenario() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let limiter = limiter_with(store.clone());
        limiter
            .configs()
            .set("/api/orders", RateConfig::new(5.0, 1.0).unwrap())
            .await
            .unwrap();

        let alice = Identity::new("alice");
        for i in 0..5 {
            let decision = limiter.check(&alice, "/api/orders", 1_000.0, 1.0).await.unwrap();
            assert!(decision.allowed, "request {} should be admitted", i + 1);
            assert_eq!(decision.limit_header(), "5");
        }

        let denied = limiter.check(&alice, "/api/orders", 1_000.0, 1.0).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining_header(), "0");
        assert_eq!(denied.retry_after(1.0), 1);

        // Other identities and other routes are unaffected
        let bob = limiter.check(&Identity::new("bob"), "/api/orders", 1_000.0, 1.0).await.unwrap();
        assert!(bob.allowed);
        let other = limiter.check(&alice, "/api/payments/1", 1_000.0, 1.0).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.limit_header(), "10");
    }

    #[tokio::test]
    async fn test_path_spellings_share_one_bucket() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let limiter = limiter_with(store);
        limiter
            .configs()
            .set("/api/orders", RateConfig::new(2.0, 0.1).unwrap())
            .await
            .unwrap();

        let alice = Identity::new("alice");
        let first = limiter.check(&alice, "/api/orders/", 1_000.0, 1.0).await.unwrap();
        assert!(first.allowed);
        assert_eq!(first.limit_header(), "2");

        let second = limiter.check(&alice, "/api//orders", 1_000.0, 1.0).await.unwrap();
        assert!(second.allowed);
        assert_eq!(second.limit_header(), "2");

        let third = limiter.check(&alice, "/api/orders", 1_000.0, 1.0).await.unwrap();
        assert!(!third.allowed);
    }

    #[tokio::test]
    async fn test_retry_after_waited_out_is_admitted() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let limiter = limiter_with(store);
        limiter
            .configs()
            .set("/api/slow", RateConfig::new(2.0, 0.3).unwrap())
            .await
            .unwrap();

        let alice = Identity::new("alice");
        let mut now = 500.0;
        limiter.check(&alice, "/api/slow", now, 1.0).await.unwrap();
        limiter.check(&alice, "/api/slow", now, 1.0).await.unwrap();

        now += 0.4;
        let denied = limiter.check(&alice, "/api/slow", now, 1.0).await.unwrap();
        assert!(!denied.allowed);
        let wait = denied.retry_after(1.0);
        assert_eq!(wait, 3);

        now += wait as f64;
        assert!(limiter.check(&alice, "/api/slow", now, 1.0).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_monotonic_refill_between_admissions() {
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let limiter = limiter_with(store);
        let alice = Identity::new("alice");
        let capacity: f64 = 10.0;
        let rate = 1.0;

        let mut last = limiter.check(&alice, "/api/orders", 100.0, 1.0).await.unwrap();
        let mut now = 100.0;
        for dt in [0.0, 0.25, 0.0, 1.5, 0.1, 3.0, 0.0] {
            now += dt;
            let next = limiter.check(&alice, "/api/orders", now, 1.0).await.unwrap();
            assert!(next.allowed);
            let floor = capacity.min(last.remaining - 1.0 + dt * rate);
            assert!(next.remaining >= floor - 1e-9);
            last = next;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_over_admit() {
        // tokens = cost * (k - 1) + 0.5 * cost with k = 10
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let limiter = Arc::new(limiter_with(store));
        limiter
            .configs()
            .set("/api/orders", RateConfig::new(9.5, 0.001).unwrap())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .check(&Identity::new("alice"), "/api/orders", 2_000.0, 1.0)
                    .await
                    .unwrap()
                    .allowed
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 9);
    }
}
