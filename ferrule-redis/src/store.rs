//! The enumerated key-value interface and the per-context connection handle.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{DecodePolicy, RedisSettings, Result};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// The store operations the integration actually uses.
///
/// Implementations own one open connection (or pool checkout). They are
/// used from a single request context at a time.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored at `key`.
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` at `key`, expiring after `ttl`.
    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. Returns whether something was deleted.
    async fn delete(&mut self, key: &str) -> Result<bool>;

    /// Whether `key` currently exists.
    async fn exists(&mut self, key: &str) -> Result<bool>;

    /// Close the underlying connection or return it to its pool.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Whole seconds for a `SETEX`, never less than one.
pub fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// A store connection cached in one request context.
pub struct Connection {
    id: u64,
    store: Box<dyn KvStore>,
    errors: DecodePolicy,
    decode_responses: bool,
}

impl Connection {
    pub fn new(store: Box<dyn KvStore>, settings: &RedisSettings) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            store,
            errors: settings.errors,
            decode_responses: settings.decode_responses,
        }
    }

    /// Process-unique handle id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Fetch raw bytes. With `decode_responses` the value is normalised
    /// through the decode policy first.
    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.store.get(key).await?;
        if !self.decode_responses {
            return Ok(value);
        }
        value
            .map(|bytes| self.errors.decode(&bytes).map(String::into_bytes))
            .transpose()
    }

    /// Fetch and decode as text
    pub async fn get_string(&mut self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).await? {
            Some(bytes) => self.errors.decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.store.set_ex(key, value, ttl).await
    }

    pub async fn delete(&mut self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }

    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.store.exists(key).await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.store.disconnect().await
    }

    /// Decode bytes with this connection's policy
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        self.errors.decode(bytes)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("errors", &self.errors)
            .field("decode_responses", &self.decode_responses)
            .finish()
    }
}
