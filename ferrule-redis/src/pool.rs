//! Redis connection pool.

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use tracing::info;

use crate::{RedisError, RedisSettings, Result};

/// Type alias for the connection pool.
pub type RedisPool = Pool<RedisConnectionManager>;

/// Builder for creating Redis connection pools.
pub struct RedisPoolBuilder {
    settings: RedisSettings,
    max_size: u32,
}

impl RedisPoolBuilder {
    /// Pool of at most `max_size` connections to the endpoint in `settings`.
    pub fn new(settings: RedisSettings, max_size: u32) -> Self {
        Self { settings, max_size }
    }

    /// Build the connection pool and check one connection out to verify it.
    pub async fn build(self) -> Result<RedisPool> {
        let url = self.settings.connection_url()?;

        let manager = RedisConnectionManager::new(url.as_str())
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        let mut builder = Pool::builder().max_size(self.max_size).min_idle(None);
        if let Some(timeout) = self.settings.socket_timeout {
            builder = builder.connection_timeout(timeout);
        }

        let pool = builder
            .build(manager)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;

        // Verify in a scope so the connection is back in the pool before returning
        {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| RedisError::Connection(e.to_string()))?;
        }

        info!(
            pool_size = self.max_size,
            url = %self.settings.redacted_url(),
            "Redis connection pool created"
        );

        Ok(pool)
    }
}
