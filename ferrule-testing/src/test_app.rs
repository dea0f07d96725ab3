// Test Application Builder

use crate::TestClient;
use ferrule_config::ConfigManager;
use ferrule_core::{Application, Error, RequestHandler};
use ferrule_redis::{Connector, MemoryConnector, MemoryStore, Redis};
use ferrule_session::RedisSessionInterface;
use std::sync::Arc;

/// An application wired to an in-memory store.
pub struct TestApp {
    pub app: Arc<Application>,
    pub redis: Arc<Redis>,
    pub sessions: Option<Arc<RedisSessionInterface>>,
    store: MemoryStore,
}

impl TestApp {
    /// Create a test client for making requests
    pub fn client(&self, handler: Arc<dyn RequestHandler>) -> TestClient {
        TestClient::new(self.app.clone(), handler)
    }

    /// The backing store, for seeding and inspecting records
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn config(&self) -> &ConfigManager {
        self.app.config()
    }
}

/// Builder for test applications
pub struct TestAppBuilder {
    config: ConfigManager,
    store: MemoryStore,
    connector: Option<Arc<dyn Connector>>,
    sessions: bool,
}

impl TestAppBuilder {
    /// Create a new test app builder
    pub fn new() -> Self {
        Self {
            config: ConfigManager::new(),
            store: MemoryStore::new(),
            connector: None,
            sessions: false,
        }
    }

    /// Set a configuration value before the application reads its defaults
    pub fn config<T: serde::Serialize>(self, key: &str, value: T) -> Result<Self, Error> {
        self.config.set(key, value)?;
        Ok(self)
    }

    /// Use an existing configuration
    pub fn with_config(self, config: ConfigManager) -> Self {
        Self { config, ..self }
    }

    /// Share a store with other apps or with the test
    pub fn with_store(self, store: MemoryStore) -> Self {
        Self { store, ..self }
    }

    /// Use a custom connector instead of the in-memory one
    pub fn with_connector(self, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
            ..self
        }
    }

    /// Install the Redis session interface
    pub fn with_sessions(self) -> Self {
        Self {
            sessions: true,
            ..self
        }
    }

    /// Build the test application
    pub fn build(self) -> Result<TestApp, Error> {
        let mut app = Application::new(self.config)?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(MemoryConnector::with_store(self.store.clone())),
        };
        let redis = Redis::init_app_with(&mut app, connector)?;

        let sessions = if self.sessions {
            Some(RedisSessionInterface::init_app(&mut app, redis.clone())?)
        } else {
            None
        };

        Ok(TestApp {
            app: Arc::new(app),
            redis,
            sessions,
            store: self.store,
        })
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
