// ============================================================================
// Gatekeeper Config - Centralized configuration management
// ============================================================================
//
// Configuration for the gateway and its collaborators, loaded from
// environment variables with defaults for every value.
//
// ============================================================================

mod constants;
mod gateway;
mod rate_limit;
mod redis;

pub use constants::{MAX_REQUEST_BODY_SIZE, REQUEST_COST};
pub use gateway::GatewayConfig;
pub use rate_limit::{RateLimitConfig, StoreBackend};
pub use redis::RedisKeyPrefixes;

use anyhow::Result;
use constants::*;

/// Main configuration structure for the gateway
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub redis_url: String,

    /// HS256 secret used to sign and verify identity tokens
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Lifetime of tokens issued by /auth/login
    pub access_token_ttl_secs: i64,

    pub rust_log: String,

    // Sub-configurations
    pub gateway: GatewayConfig,
    pub rate_limit: RateLimitConfig,
    pub redis_key_prefixes: RedisKeyPrefixes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            rust_log: "info".to_string(),
            gateway: GatewayConfig::default(),
            rate_limit: RateLimitConfig::default(),
            redis_key_prefixes: RedisKeyPrefixes::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let gateway = GatewayConfig::from_env();
        let rate_limit = RateLimitConfig::from_env()?;
        let redis_key_prefixes = RedisKeyPrefixes::from_env();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            port,
            bind_address: format!("0.0.0.0:{}", port),
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),

            jwt_secret: Self::load_jwt_secret(),
            jwt_issuer: std::env::var("JWT_ISSUER")
                .unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string()),
            access_token_ttl_secs: std::env::var("ACCESS_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ttl: &i64| *ttl > 0)
                .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS),

            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            gateway,
            rate_limit,
            redis_key_prefixes,
        })
    }

    fn load_jwt_secret() -> String {
        match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!(
                    "JWT_SECRET is not set; using the development secret. \
                    Set JWT_SECRET before exposing the gateway."
                );
                DEV_JWT_SECRET.to_string()
            }
        }
    }
}
