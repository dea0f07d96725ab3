// Mock connectors and hooks for testing

use async_trait::async_trait;
use ferrule_core::lifecycle::{LifecycleResult, TeardownHook};
use ferrule_core::{Error, RequestContext};
use ferrule_redis::{Connector, KvStore, RedisError, RedisSettings};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Connector whose every attempt fails as if the server were down.
#[derive(Debug, Clone)]
pub struct FailingConnector {
    message: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingConnector {
    pub fn new() -> Self {
        Self::with_message("connection refused")
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connection attempts so far
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, _settings: &RedisSettings) -> ferrule_redis::Result<Box<dyn KvStore>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RedisError::Connection(self.message.clone()))
    }
}

/// Wraps another connector and counts successful connects.
#[derive(Clone)]
pub struct CountingConnector {
    inner: Arc<dyn Connector>,
    connects: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub fn new(inner: Arc<dyn Connector>) -> Self {
        Self {
            inner,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.connects.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, settings: &RedisSettings) -> ferrule_redis::Result<Box<dyn KvStore>> {
        let store = self.inner.connect(settings).await?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(store)
    }
}

/// Teardown hook that records the requests it saw.
///
/// Each entry is the hook's label and the error message the request ended
/// with, if any. Labels let tests share one log across hooks to check
/// their order.
#[derive(Clone)]
pub struct RecordingHook {
    label: String,
    log: Arc<Mutex<Vec<(String, Option<String>)>>>,
    fail: bool,
}

impl RecordingHook {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            log: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Another hook writing to the same log
    pub fn sibling(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            log: self.log.clone(),
            fail: false,
        }
    }

    /// Make the hook return an error after recording
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.log.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.log.lock().iter().map(|(label, _)| label.clone()).collect()
    }
}

#[async_trait]
impl TeardownHook for RecordingHook {
    fn name(&self) -> &str {
        &self.label
    }

    async fn teardown(&self, _ctx: &mut RequestContext, error: Option<&Error>) -> LifecycleResult {
        self.log
            .lock()
            .push((self.label.clone(), error.map(|e| e.to_string())));
        if self.fail {
            return Err(format!("{} failed", self.label).into());
        }
        Ok(())
    }
}
