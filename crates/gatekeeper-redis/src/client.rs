//! Redis client implementation with connection management

use crate::Result;
use redis::{AsyncCommands, Script, aio::ConnectionManager};
use std::collections::HashMap;

/// Redis client with automatic reconnection
///
/// Cloning is cheap: clones share the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// PING - Check connectivity
    pub async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    // ============================================================================
    // Key-Value Operations
    // ============================================================================

    /// GET - Get value by key
    pub async fn get<T: redis::FromRedisValue>(&mut self, key: &str) -> Result<Option<T>> {
        self.conn.get(key).await
    }

    /// DEL - Delete one or more keys
    pub async fn del<K>(&mut self, keys: K) -> Result<i64>
    where
        K: redis::ToRedisArgs + Send + Sync,
    {
        self.conn.del(keys).await
    }

    /// PTTL - Get time to live in milliseconds
    pub async fn pttl(&mut self, key: &str) -> Result<i64> {
        self.conn.pttl(key).await
    }

    // ============================================================================
    // Hash Operations
    // ============================================================================

    /// HGET - Get a single hash field
    pub async fn hget<T: redis::FromRedisValue>(
        &mut self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        self.conn.hget(key, field).await
    }

    /// HSET - Set a single hash field
    pub async fn hset<V>(&mut self, key: &str, field: &str, value: V) -> Result<()>
    where
        V: redis::ToRedisArgs + Send + Sync,
    {
        let _: i64 = self.conn.hset(key, field, value).await?;
        Ok(())
    }

    /// HGETALL - Get every field of a hash
    pub async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        self.conn.hgetall(key).await
    }

    // ============================================================================
    // Lua Scripts
    // ============================================================================

    /// Create a script handle; the SHA is computed once and reused on every call
    pub fn create_script(code: &str) -> Script {
        Script::new(code)
    }

    /// Run a script atomically against `keys`
    ///
    /// Uses EVALSHA and falls back to EVAL when the server has not cached the script yet.
    pub async fn eval_script<T: redis::FromRedisValue>(
        &mut self,
        script: &Script,
        keys: &[&str],
        args: &[String],
    ) -> Result<T> {
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        invocation.invoke_async(&mut self.conn).await
    }
}
