// Ferrule - per-request Redis connections and server-side sessions
//
// This library binds Redis connections to the lifetime of an HTTP request
// and stores sessions in Redis behind a cookie-carried id.

use std::sync::Arc;

// Re-export core functionality
pub use ferrule_core::*;

pub use ferrule_config;
pub use ferrule_redis;
pub use ferrule_session;

pub use ferrule_config::ConfigManager;
pub use ferrule_redis::{Connector, Redis, RedisError, RedisSettings};
pub use ferrule_session::{RedisSessionInterface, SessionError, SessionStoreConfig};

#[cfg(feature = "testing")]
pub use ferrule_testing;

/// Register Redis with `app`, and Redis sessions when `REDIS_SESSIONS` is set.
///
/// Missing `REDIS_*` and `SESSION_*` keys receive their defaults; keys the
/// application already set are kept.
pub fn init_app(app: &mut Application) -> Result<Arc<Redis>> {
    let redis = Redis::init_app(app)?;
    install_sessions(app, &redis)?;
    Ok(redis)
}

/// [`init_app`] with a custom connector, e.g. an in-memory store.
pub fn init_app_with(app: &mut Application, connector: Arc<dyn Connector>) -> Result<Arc<Redis>> {
    let redis = Redis::init_app_with(app, connector)?;
    install_sessions(app, &redis)?;
    Ok(redis)
}

fn install_sessions(app: &mut Application, redis: &Arc<Redis>) -> Result<()> {
    if redis.settings().sessions {
        RedisSessionInterface::init_app(app, redis.clone())?;
    }
    Ok(())
}

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppSettings, Application, ConfigManager, Error, HttpRequest, HttpResponse, Redis,
        RedisSessionInterface, RedisSettings, RequestContext, RequestHandler, Session,
        SessionInterface, SetCookie, init_app,
    };
}
