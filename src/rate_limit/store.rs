//! Shared Token Store seam
//!
//! The gateway never holds authoritative bucket state; everything goes through
//! a [`TokenStore`]. Production wires [`super::RedisTokenStore`], tests and
//! single-instance setups wire [`super::InMemoryTokenStore`] or a fake.

use super::token_bucket::ConsumeOutcome;
use async_trait::async_trait;
use gatekeeper_error::AppError;
use gatekeeper_types::{BucketKeys, RateConfig};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("redis error: {0}")]
    Redis(#[from] gatekeeper_redis::RedisError),

    #[error("malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Trait for Shared Token Store backends
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Atomically refill the bucket at `keys` and try to take `cost` tokens.
    ///
    /// Must be linearizable per key pair: concurrent callers for the same
    /// bucket observe each other's writes as if they ran one after another.
    /// Writes (with expiration `config.bucket_ttl_ms()`) only on admission.
    async fn consume(
        &self,
        keys: &BucketKeys,
        config: &RateConfig,
        now: f64,
        cost: f64,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Stored config for one route path, if any
    async fn rate_config(&self, path: &str) -> Result<Option<RateConfig>, StoreError>;

    /// Every stored route config
    async fn rate_configs(&self) -> Result<HashMap<String, RateConfig>, StoreError>;

    /// Upsert the config for one route path
    async fn set_rate_config(&self, path: &str, config: &RateConfig) -> Result<(), StoreError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Decode a stored `{capacity, refillRate}` value
pub(crate) fn decode_rate_config(key: &str, raw: &str) -> Result<RateConfig, StoreError> {
    let config: RateConfig = serde_json::from_str(raw).map_err(|e| StoreError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    if !config.is_valid() {
        return Err(StoreError::Malformed {
            key: key.to_string(),
            reason: "capacity and refillRate must be positive".to_string(),
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rate_config() {
        let config = decode_rate_config("/api/orders", r#"{"capacity":5,"refillRate":1}"#).unwrap();
        assert_eq!(config, RateConfig::new(5.0, 1.0).unwrap());

        assert!(matches!(
            decode_rate_config("/api/orders", "not json"),
            Err(StoreError::Malformed { .. })
        ));
        assert!(matches!(
            decode_rate_config("/api/orders", r#"{"capacity":0,"refillRate":1}"#),
            Err(StoreError::Malformed { .. })
        ));
    }
}
