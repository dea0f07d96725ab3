//! In-process store for development and tests.
//!
//! [`MemoryStore`] keeps values in a shared map and honours expiry using
//! tokio's clock, so tests can pause and advance time.
//! [`MemoryConnector`] hands out handles onto one store and counts how many
//! were opened and closed.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::connector::Connector;
use crate::store::{KvStore, ttl_secs};
use crate::{RedisError, RedisSettings, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Shared in-memory key space
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store with a TTL, rounded like `SETEX` (whole seconds, at least one)
    pub fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) {
        let ttl = Duration::from_secs(ttl_secs(ttl));
        self.insert_raw(key, value.to_vec(), Some(ttl));
    }

    /// Store bytes as-is, optionally without expiry.
    ///
    /// Every write also drops entries that have already expired, so keys
    /// nobody reads again do not pile up. A TTL past the clock's range
    /// stores without expiry.
    pub fn insert_raw(&self, key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>) {
        let now = Instant::now();
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(key.into(), Entry { value, expires_at });
    }

    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Raw stored bytes, if live
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)
    }

    /// Remaining time to live. `None` if missing or stored without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        let entry = entries.get(key).filter(|e| e.is_live(now))?;
        entry.expires_at.map(|at| at - now)
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// One open handle onto a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
    closed: Arc<AtomicUsize>,
    open: bool,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<&MemoryStore> {
        if self.open {
            Ok(&self.store)
        } else {
            Err(RedisError::Connection("connection closed".to_string()))
        }
    }
}

#[async_trait]
impl KvStore for MemoryConnection {
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.check_open()?.get(key))
    }

    async fn set_ex(&mut self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check_open()?.set_ex(key, value, ttl);
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.check_open()?.delete(key))
    }

    async fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.check_open()?.exists(key))
    }

    async fn disconnect(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.open, false) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Connector that opens handles onto a shared [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector over an existing store
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Handles opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles disconnected so far
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Convenience passthroughs to the store
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.store.ttl(key)
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.store.raw(key)
    }

    pub fn insert_raw(&self, key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>) {
        self.store.insert_raw(key, value, ttl)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _settings: &RedisSettings) -> Result<Box<dyn KvStore>> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(opened = n, "Opened in-memory connection");
        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
            closed: self.closed.clone(),
            open: true,
        }))
    }
}
