//! In-memory Shared Token Store
//!
//! Single-process stand-in for Redis. The whole consume step runs under one
//! async mutex, which gives the same per-bucket linearizability the Lua script
//! gets from Redis. Expiry is evaluated against the caller-supplied `now`.

use super::store::{StoreError, TokenStore};
use super::token_bucket::{self, ConsumeOutcome};
use async_trait::async_trait;
use gatekeeper_types::{BucketKeys, RateConfig};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory storage entry with expiration (seconds since epoch)
#[derive(Debug, Clone, Copy)]
struct MemoryEntry {
    value: f64,
    expires_at: f64,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, MemoryEntry>,
    configs: HashMap<String, RateConfig>,
}

impl MemoryState {
    fn live_value(&self, key: &str, now: f64) -> Option<f64> {
        self.values
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value)
    }
}

/// In-memory storage backend for development and single-instance deployments
#[derive(Default)]
pub struct InMemoryTokenStore {
    state: Mutex<MemoryState>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop bucket entries whose expiration has passed
    pub async fn purge_expired(&self, now: f64) -> usize {
        let mut state = self.state.lock().await;
        let before = state.values.len();
        state.values.retain(|_, entry| entry.expires_at > now);
        let purged = before - state.values.len();
        if purged > 0 {
            debug!(purged = purged, "Purged expired bucket entries");
        }
        purged
    }

    /// Number of live bucket keys (tokens and timestamp keys count separately)
    pub async fn bucket_key_count(&self, now: f64) -> usize {
        let state = self.state.lock().await;
        state
            .values
            .values()
            .filter(|entry| now < entry.expires_at)
            .count()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn consume(
        &self,
        keys: &BucketKeys,
        config: &RateConfig,
        now: f64,
        cost: f64,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let tokens = state.live_value(&keys.tokens, now);
        let last_refreshed = state.live_value(&keys.timestamp, now);

        let (outcome, write) = token_bucket::consume(tokens, last_refreshed, config, now, cost);

        if let Some(write) = write {
            let expires_at = now + config.bucket_ttl_ms() as f64 / 1000.0;
            state.values.insert(
                keys.tokens.clone(),
                MemoryEntry {
                    value: write.tokens,
                    expires_at,
                },
            );
            state.values.insert(
                keys.timestamp.clone(),
                MemoryEntry {
                    value: write.last_refreshed,
                    expires_at,
                },
            );
        }

        Ok(outcome)
    }

    async fn rate_config(&self, path: &str) -> Result<Option<RateConfig>, StoreError> {
        Ok(self.state.lock().await.configs.get(path).copied())
    }

    async fn rate_configs(&self) -> Result<HashMap<String, RateConfig>, StoreError> {
        Ok(self.state.lock().await.configs.clone())
    }

    async fn set_rate_config(&self, path: &str, config: &RateConfig) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .configs
            .insert(path.to_string(), *config);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
