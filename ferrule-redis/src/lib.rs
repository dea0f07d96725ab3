//! # Ferrule Redis
//!
//! Redis connection management bound to the request lifecycle.
//!
//! ## Features
//!
//! - **Per-request connections**: at most one connection per request
//!   context, opened lazily and released at teardown
//! - **Connection pooling**: optional bb8 pool when `REDIS_CONNECTION_POOL`
//!   is set
//! - **Configuration**: typed settings from `REDIS_*` keys with defaults
//! - **In-memory store**: a `Connector` for development and tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrule_core::{Application, RequestContext};
//! use ferrule_redis::Redis;
//! use std::time::Duration;
//!
//! let mut app = Application::new(config)?;
//! let redis = Redis::init_app(&mut app)?;
//!
//! // Inside a handler
//! let conn = redis.get_connection(ctx).await?;
//! conn.set_ex("greeting", b"hello", Duration::from_secs(60)).await?;
//! let value = conn.get_string("greeting").await?;
//! ```

mod config;
mod connector;
mod error;
mod manager;
mod memory;
mod pool;
mod store;

pub use config::{DecodePolicy, RedisSettings, RedisSettingsBuilder, keys};
pub use connector::{Connector, RedisConnector, RedisStore};
pub use error::{RedisError, Result};
pub use manager::Redis;
pub use memory::{MemoryConnection, MemoryConnector, MemoryStore};
pub use pool::{RedisPool, RedisPoolBuilder};
pub use store::{Connection, KvStore, ttl_secs};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use ferrule_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{DecodePolicy, RedisSettings, RedisSettingsBuilder};
    pub use crate::connector::{Connector, RedisConnector};
    pub use crate::error::{RedisError, Result};
    pub use crate::manager::Redis;
    pub use crate::memory::{MemoryConnector, MemoryStore};
    pub use crate::store::{Connection, KvStore};
}
