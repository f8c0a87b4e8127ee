// ============================================================================
// Rate Limit Configuration
// ============================================================================

use crate::constants::*;
use std::fmt;
use std::str::FromStr;

/// Where bucket state and route configs live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis instance (multi-instance safe)
    Redis,
    /// Process-local maps (single instance only)
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("STORE_BACKEND must be 'redis' or 'memory', got '{}'", other),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Redis => f.write_str("redis"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Fallback bucket and config read caching
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Capacity used when a route has no stored config
    pub default_capacity: f64,
    /// Refill rate (tokens/second) used when a route has no stored config
    pub default_refill_rate: f64,
    /// Local cache window for config reads; 0 disables the cache
    pub config_cache_ttl_ms: u64,
    pub store_backend: StoreBackend,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_RATE_CAPACITY,
            default_refill_rate: DEFAULT_RATE_REFILL_RATE,
            config_cache_ttl_ms: 0,
            store_backend: StoreBackend::Redis,
        }
    }
}

impl RateLimitConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            default_capacity: std::env::var("DEFAULT_RATE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RATE_CAPACITY),
            default_refill_rate: std::env::var("DEFAULT_RATE_REFILL_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RATE_REFILL_RATE),
            config_cache_ttl_ms: std::env::var("RATE_CONFIG_CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            store_backend: match std::env::var("STORE_BACKEND") {
                Ok(value) => value.parse()?,
                Err(_) => StoreBackend::Redis,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !is_positive(self.default_capacity) || !is_positive(self.default_refill_rate) {
            anyhow::bail!(
                "DEFAULT_RATE_CAPACITY and DEFAULT_RATE_REFILL_RATE must be positive numbers"
            );
        }
        // A smaller bucket could never admit a single request
        if self.default_capacity < REQUEST_COST {
            anyhow::bail!(
                "DEFAULT_RATE_CAPACITY must be at least {} (got {})",
                REQUEST_COST,
                self.default_capacity
            );
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
