//! # Gatekeeper Redis
//!
//! Low-level Redis client for the gatekeeper gateway.
//!
//! ## Design Principles
//!
//! - **No business logic** - Pure infrastructure layer
//! - **No dependencies** on other gatekeeper-* crates
//! - **Generic operations** - Callers own key layout and value formats
//!
//! ## Features
//!
//! - Connection management with automatic reconnection
//! - Key-value reads, deletes and TTL inspection
//! - Hash operations
//! - Atomic Lua scripts (EVALSHA with EVAL fallback)
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatekeeper_redis::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!
//!     client.hset("rate_limits_config", "/api/orders", r#"{"capacity":5,"refillRate":1}"#).await?;
//!     let value: Option<String> = client.hget("rate_limits_config", "/api/orders").await?;
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::{RedisError, Script};

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
