//! Redis-backed Shared Token Store
//!
//! The check-and-consume step runs as one Lua script, so Redis executes the
//! read, refill, compare and conditional write without interleaving other
//! callers. Numbers cross the script boundary as strings: Redis truncates Lua
//! numbers to integers in replies, which would floor `remaining` too early.

use super::store::{StoreError, TokenStore, decode_rate_config};
use super::token_bucket::ConsumeOutcome;
use async_trait::async_trait;
use gatekeeper_redis::{RedisClient, Script};
use gatekeeper_types::{BucketKeys, RateConfig};
use std::collections::HashMap;
use tracing::{debug, warn};

// KEYS[1]: tokens key        ARGV[1]: refill rate (tokens/s)
// KEYS[2]: timestamp key     ARGV[2]: capacity
//                            ARGV[3]: now (seconds, fractional)
//                            ARGV[4]: cost
//                            ARGV[5]: expiration (ms, integer string passed to PX as is)
const CONSUME_TOKENS_SCRIPT: &str = r#"
local tokens_key = KEYS[1]
local timestamp_key = KEYS[2]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local requested = tonumber(ARGV[4])

local last_tokens = tonumber(redis.call("get", tokens_key))
if last_tokens == nil then
  last_tokens = capacity
end

local last_refreshed = tonumber(redis.call("get", timestamp_key))
if last_refreshed == nil then
  last_refreshed = 0
end

local delta = math.max(0, now - last_refreshed)
local filled_tokens = math.min(capacity, last_tokens + (delta * rate))
local allowed = 0
local new_tokens = filled_tokens

if filled_tokens >= requested then
  allowed = 1
  new_tokens = filled_tokens - requested
  redis.call("set", tokens_key, string.format("%.17g", new_tokens), "PX", ARGV[5])
  redis.call("set", timestamp_key, string.format("%.17g", now), "PX", ARGV[5])
end

return { allowed, string.format("%.17g", new_tokens) }
"#;

/// Redis storage backend
pub struct RedisTokenStore {
    client: RedisClient,
    consume_script: Script,
    config_hash: String,
}

impl RedisTokenStore {
    pub fn new(client: RedisClient, config_hash: impl Into<String>) -> Self {
        Self {
            client,
            consume_script: RedisClient::create_script(CONSUME_TOKENS_SCRIPT),
            config_hash: config_hash.into(),
        }
    }

    /// Connect and verify the connection with PING
    pub async fn connect(url: &str, config_hash: impl Into<String>) -> Result<Self, StoreError> {
        let mut client = RedisClient::connect(url).await.map_err(|e| {
            warn!(error = %e, "Failed to connect to Redis for rate limiting");
            StoreError::Redis(e)
        })?;
        client.ping().await?;

        debug!("Successfully connected to Redis for rate limiting");
        Ok(Self::new(client, config_hash))
    }
}

/// ARGV for the consume script
fn script_args(config: &RateConfig, now: f64, cost: f64) -> [String; 5] {
    [
        config.refill_rate.to_string(),
        config.capacity.to_string(),
        now.to_string(),
        cost.to_string(),
        config.bucket_ttl_ms().to_string(),
    ]
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn consume(
        &self,
        keys: &BucketKeys,
        config: &RateConfig,
        now: f64,
        cost: f64,
    ) -> Result<ConsumeOutcome, StoreError> {
        let mut client = self.client.clone();
        let args = script_args(config, now, cost);

        let (allowed, remaining): (i64, String) = client
            .eval_script(
                &self.consume_script,
                &[keys.tokens.as_str(), keys.timestamp.as_str()],
                &args,
            )
            .await?;

        let remaining = remaining
            .parse::<f64>()
            .map_err(|e| StoreError::Malformed {
                key: keys.tokens.clone(),
                reason: e.to_string(),
            })?;

        Ok(ConsumeOutcome {
            allowed: allowed == 1,
            remaining,
        })
    }

    async fn rate_config(&self, path: &str) -> Result<Option<RateConfig>, StoreError> {
        let mut client = self.client.clone();
        let raw: Option<String> = client.hget(&self.config_hash, path).await?;
        raw.map(|value| decode_rate_config(path, &value)).transpose()
    }

    async fn rate_configs(&self) -> Result<HashMap<String, RateConfig>, StoreError> {
        let mut client = self.client.clone();
        let raw = client.hgetall(&self.config_hash).await?;

        raw.into_iter()
            .map(|(path, value)| {
                let config = decode_rate_config(&path, &value)?;
                Ok((path, config))
            })
            .collect()
    }

    async fn set_rate_config(&self, path: &str, config: &RateConfig) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        let value = serde_json::to_string(config).map_err(|e| StoreError::Malformed {
            key: path.to_string(),
            reason: e.to_string(),
        })?;
        client.hset(&self.config_hash, path, value).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.ping().await?;
        Ok(())
    }
}
