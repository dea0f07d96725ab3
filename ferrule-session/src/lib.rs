//! Redis-backed server-side sessions for ferrule.
//!
//! [`RedisSessionInterface`] plugs into an [`Application`](ferrule_core::Application)
//! as its session interface. Each request's session is loaded from the
//! record named by the session cookie and written back, with a TTL, when
//! the request finishes. Records live under `<prefix><sid>:data` as JSON
//! objects.
//!
//! Store access goes through the request's cached connection, so a request
//! that touches its session and also uses Redis directly opens a single
//! connection.
//!
//! # Examples
//!
//! ```no_run
//! use ferrule_config::ConfigManager;
//! use ferrule_core::Application;
//! use ferrule_redis::Redis;
//! use ferrule_session::RedisSessionInterface;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = Application::new(ConfigManager::new())?;
//! let redis = Redis::init_app(&mut app)?;
//! RedisSessionInterface::init_app(&mut app, redis)?;
//! # Ok(())
//! # }
//! ```
//!
//! Handlers then read and write `ctx.session_mut()`; an emptied session has
//! its record deleted and its cookie cleared.
//!
//! # Configuration
//!
//! | Key | Default |
//! |---|---|
//! | `SESSION_KEY_PREFIX` | `"session:"` |
//! | `SESSION_DEFAULT_TTL` | `86400` |
//! | `SESSION_ON_CORRUPT` | `"reset"` |
//!
//! Permanent sessions use the framework's `PERMANENT_SESSION_LIFETIME`.

pub mod config;
pub mod error;
pub mod interface;
pub mod serializer;
pub mod sid;

pub use config::{CorruptPolicy, SessionStoreConfig};
pub use error::{SessionError, SessionResult};
pub use interface::{RedisSessionInterface, RedisSessionInterfaceBuilder, store_record};
pub use serializer::{JsonSerializer, PERMANENT_KEY, SessionSerializer};
pub use sid::{SidGenerator, generate_sid};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CorruptPolicy, SessionStoreConfig};
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::interface::RedisSessionInterface;
    pub use crate::serializer::{JsonSerializer, SessionSerializer};
    pub use crate::sid::generate_sid;
}
