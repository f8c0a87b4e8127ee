//! Rate Config Store
//!
//! Per-route `{capacity, refillRate}` lookups for the limiter and the admin API.
//! A route without a stored config uses the gateway default.

use super::store::{StoreError, TokenStore};
use gatekeeper_config::RateLimitConfig;
use gatekeeper_types::RateConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Upper bound on cached paths; lookups past it go to the store uncached
const MAX_CACHED_CONFIGS: usize = 10_000;

/// Cached lookup result: `None` records a miss so defaults are cached too
#[derive(Clone, Copy)]
struct CachedConfig {
    config: Option<RateConfig>,
    fetched_at: Instant,
}

/// Paths are caller-controlled, so expired entries are swept at most once per TTL
struct ConfigCache {
    entries: HashMap<String, CachedConfig>,
    last_sweep: Instant,
}

impl ConfigCache {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            last_sweep: Instant::now(),
        }
    }

    fn insert(&mut self, path: &str, config: Option<RateConfig>, ttl: Duration) {
        if self.last_sweep.elapsed() >= ttl {
            self.entries.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
            self.last_sweep = Instant::now();
        }

        if self.entries.len() >= MAX_CACHED_CONFIGS && !self.entries.contains_key(path) {
            return;
        }

        self.entries.insert(
            path.to_string(),
            CachedConfig {
                config,
                fetched_at: Instant::now(),
            },
        );
    }
}

pub struct RateConfigStore {
    store: Arc<dyn TokenStore>,
    default_config: RateConfig,
    cache_ttl: Option<Duration>,
    cache: RwLock<ConfigCache>,
}

impl RateConfigStore {
    pub fn new(store: Arc<dyn TokenStore>, default_config: RateConfig) -> Self {
        Self {
            store,
            default_config,
            cache_ttl: None,
            cache: RwLock::new(ConfigCache::new()),
        }
    }

    /// Build from gateway settings; `config_cache_ttl_ms == 0` disables caching
    pub fn from_config(
        store: Arc<dyn TokenStore>,
        settings: &RateLimitConfig,
    ) -> anyhow::Result<Self> {
        let default_config =
            RateConfig::new(settings.default_capacity, settings.default_refill_rate)?;
        let cache_ttl = (settings.config_cache_ttl_ms > 0)
            .then(|| Duration::from_millis(settings.config_cache_ttl_ms));

        Ok(Self::new(store, default_config).with_cache_ttl(cache_ttl))
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn default_config(&self) -> RateConfig {
        self.default_config
    }

    /// Config for `path`, falling back to the default on a miss
    pub async fn get(&self, path: &str) -> Result<RateConfig, StoreError> {
        if let Some(ttl) = self.cache_ttl
            && let Some(cached) = self.cache.read().await.entries.get(path).copied()
            && cached.fetched_at.elapsed() < ttl
        {
            return Ok(cached.config.unwrap_or(self.default_config));
        }

        let stored = self.store.rate_config(path).await?;

        if let Some(ttl) = self.cache_ttl {
            self.cache.write().await.insert(path, stored, ttl);
        }

        Ok(stored.unwrap_or(self.default_config))
    }

    /// Every stored route config, ordered by path
    pub async fn get_all(&self) -> Result<BTreeMap<String, RateConfig>, StoreError> {
        let configs = self.store.rate_configs().await?;
        Ok(configs.into_iter().collect())
    }

    /// Upsert the config for `path`
    pub async fn set(&self, path: &str, config: RateConfig) -> Result<(), StoreError> {
        self.store.set_rate_config(path, &config).await?;
        self.cache.write().await.entries.remove(path);

        debug!(
            path = %path,
            capacity = config.capacity,
            refill_rate = config.refill_rate,
            "Rate config updated"
        );
        Ok(())
    }

    #[cfg(test)]
    async fn cached_entries(&self) -> usize {
        self.cache.read().await.entries.len()
    }
}
