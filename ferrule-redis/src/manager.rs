//! Per-request connection manager.

use async_trait::async_trait;
use ferrule_config::ConfigManager;
use ferrule_core::lifecycle::{LifecycleResult, TeardownHook};
use ferrule_core::{Application, Error as CoreError, RequestContext, ResourceKey};
use std::sync::Arc;
use tracing::debug;

use crate::connector::{Connector, RedisConnector};
use crate::store::Connection;
use crate::{RedisError, RedisSettings, Result};

/// Binds store connections to request contexts.
///
/// The first [`Redis::get_connection`] in a context opens a connection and
/// caches it there; later calls in the same context return that handle.
/// The handle is released when the context is torn down.
pub struct Redis {
    key: ResourceKey,
    settings: RedisSettings,
    connector: Arc<dyn Connector>,
}

impl Redis {
    pub fn new(settings: RedisSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            key: ResourceKey::new(),
            settings,
            connector,
        }
    }

    /// Apply `REDIS_*` defaults and resolve settings from `config`.
    pub fn from_config(config: &ConfigManager, connector: Arc<dyn Connector>) -> Result<Self> {
        RedisSettings::apply_defaults(config)?;
        let settings = RedisSettings::from_config(config)?;
        Ok(Self::new(settings, connector))
    }

    /// Register with an application using the real Redis connector.
    pub fn init_app(app: &mut Application) -> Result<Arc<Self>> {
        Self::init_app_with(app, Arc::new(RedisConnector::new()))
    }

    /// Register with an application using a custom connector.
    pub fn init_app_with(
        app: &mut Application,
        connector: Arc<dyn Connector>,
    ) -> Result<Arc<Self>> {
        let redis = Arc::new(Self::from_config(app.config(), connector)?);
        app.add_teardown_hook(redis.clone());

        debug!(
            url = %redis.settings.redacted_url(),
            pooled = redis.settings.connection_pool.is_some(),
            "Redis registered"
        );
        Ok(redis)
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    /// Slot this manager uses in each context's resource table
    pub fn resource_key(&self) -> ResourceKey {
        self.key
    }

    /// The connection for `ctx`, opened on first use.
    ///
    /// Connection failures are returned as-is; nothing is retried.
    pub async fn get_connection<'c>(
        &self,
        ctx: &'c mut RequestContext,
    ) -> Result<&'c mut Connection> {
        if !ctx.resources().contains(self.key) {
            let store = self.connector.connect(&self.settings).await?;
            let conn = Connection::new(store, &self.settings);
            debug!(context = %ctx.id(), connection = conn.id(), "Redis connection opened");
            ctx.resources_mut().insert(self.key, conn);
        }

        ctx.resources_mut()
            .get_mut::<Connection>(self.key)
            .ok_or_else(|| {
                RedisError::Config("resource slot holds a value of another type".to_string())
            })
    }

    pub fn has_connection(&self, ctx: &RequestContext) -> bool {
        ctx.resources().get::<Connection>(self.key).is_some()
    }

    /// Disconnect and drop the cached connection, if any.
    ///
    /// Returns whether a connection was released. Calling this again is a
    /// no-op. The handle leaves the context even if disconnecting fails.
    pub async fn release_connection(&self, ctx: &mut RequestContext) -> Result<bool> {
        let Some(mut conn) = ctx.resources_mut().take::<Connection>(self.key) else {
            return Ok(false);
        };

        let id = conn.id();
        conn.disconnect().await?;
        debug!(context = %ctx.id(), connection = id, "Redis connection released");
        Ok(true)
    }
}

#[async_trait]
impl TeardownHook for Redis {
    fn name(&self) -> &str {
        "ferrule_redis::Redis"
    }

    async fn teardown(&self, ctx: &mut RequestContext, _error: Option<&CoreError>) -> LifecycleResult {
        self.release_connection(ctx).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Redis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redis")
            .field("key", &self.key)
            .field("url", &self.settings.redacted_url())
            .finish()
    }
}
