//! Opening store connections.

use async_trait::async_trait;
use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::pool::{RedisPool, RedisPoolBuilder};
use crate::store::{KvStore, ttl_secs};
use crate::{RedisError, RedisSettings, Result};

const DEFAULT_POOL_SIZE: u32 = 10;

/// Opens a [`KvStore`] for the endpoint described by the settings.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, settings: &RedisSettings) -> Result<Box<dyn KvStore>>;
}

/// Connector for a real Redis server.
///
/// Without a pool override each call opens a dedicated multiplexed
/// connection. With `connection_pool` set, a bb8 pool is built on first use
/// and connections are checked out of it.
#[derive(Default)]
pub struct RedisConnector {
    pool: OnceCell<RedisPool>,
}

impl RedisConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing pool for every connection.
    pub fn with_pool(pool: RedisPool) -> Self {
        Self {
            pool: OnceCell::new_with(Some(pool)),
        }
    }

    /// The pool, once one has been built or supplied
    pub fn pool(&self) -> Option<&RedisPool> {
        self.pool.get()
    }

    async fn dedicated(&self, settings: &RedisSettings) -> Result<RedisStore> {
        let url = settings.connection_url()?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| RedisError::Config(e.to_string()))?;

        let conn = bounded(settings.socket_timeout, async {
            client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| RedisError::Connection(e.to_string()))
        })
        .await?;

        Ok(RedisStore::new(Link::Dedicated(conn), settings.socket_timeout))
    }

    async fn pooled(&self, settings: &RedisSettings) -> Result<RedisStore> {
        let max_size = settings.connection_pool.unwrap_or(DEFAULT_POOL_SIZE);
        let pool = self
            .pool
            .get_or_try_init(|| RedisPoolBuilder::new(settings.clone(), max_size).build())
            .await?;

        let conn = pool.get_owned().await?;
        Ok(RedisStore::new(Link::Pooled(conn), settings.socket_timeout))
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self, settings: &RedisSettings) -> Result<Box<dyn KvStore>> {
        let store = if self.pool.initialized() || settings.connection_pool.is_some() {
            self.pooled(settings).await?
        } else {
            self.dedicated(settings).await?
        };

        debug!(url = %settings.redacted_url(), pooled = store.is_pooled(), "Opened Redis connection");
        Ok(Box::new(store))
    }
}

enum Link {
    Dedicated(MultiplexedConnection),
    Pooled(PooledConnection<'static, RedisConnectionManager>),
}

/// [`KvStore`] over a live Redis connection
pub struct RedisStore {
    link: Option<Link>,
    timeout: Option<Duration>,
}

impl RedisStore {
    fn new(link: Link, timeout: Option<Duration>) -> Self {
        Self {
            link: Some(link),
            timeout,
        }
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.link, Some(Link::Pooled(_)))
    }

    fn conn(&mut self) -> Result<&mut MultiplexedConnection> {
        match &mut self.link {
            Some(Link::Dedicated(conn)) => Ok(conn),
            Some(Link::Pooled(conn)) => Ok(&mut **conn),
            None => Err(RedisError::Connection("connection closed".to_string())),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let timeout = self.timeout;
        let conn = self.conn()?;
        bounded(timeout, async move {
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok(value)
        })
        .await
    }

    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let timeout = self.timeout;
        let conn = self.conn()?;
        bounded(timeout, async move {
            let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&mut self, key: &str) -> Result<bool> {
        let timeout = self.timeout;
        let conn = self.conn()?;
        bounded(timeout, async move {
            let deleted: u32 = conn.del(key).await?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn exists(&mut self, key: &str) -> Result<bool> {
        let timeout = self.timeout;
        let conn = self.conn()?;
        bounded(timeout, async move {
            let exists: bool = conn.exists(key).await?;
            Ok(exists)
        })
        .await
    }

    async fn disconnect(&mut self) -> Result<()> {
        // Dropping returns a pooled connection; a dedicated one closes
        self.link.take();
        Ok(())
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| RedisError::Timeout)?,
        None => fut.await,
    }
}
