// ============================================================================
// Redis Configuration
// ============================================================================

/// Key layout inside the Shared Token Store
#[derive(Clone, Debug)]
pub struct RedisKeyPrefixes {
    /// Prefix for bucket keys: "rate:{identity}:{path}:tokens" / ":ts"
    pub rate: String,
    /// Hash holding per-path rate configs (field = path, value = JSON)
    pub rate_config_hash: String,
}

impl Default for RedisKeyPrefixes {
    fn default() -> Self {
        Self {
            rate: "rate:".to_string(),
            rate_config_hash: "rate_limits_config".to_string(),
        }
    }
}

impl RedisKeyPrefixes {
    pub(crate) fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rate: std::env::var("REDIS_KEY_PREFIX_RATE").unwrap_or(defaults.rate),
            rate_config_hash: std::env::var("RATE_CONFIG_HASH")
                .unwrap_or(defaults.rate_config_hash),
        }
    }
}
