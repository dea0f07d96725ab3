// Session counter example
//
// Counts visits per browser in a Redis-backed session.
//
//   cargo run --example session_counter            # Redis on localhost:6379
//   cargo run --example session_counter -- --memory
//
// Any REDIS_* or SESSION_* key can be set through the environment with a
// FERRULE_ prefix, e.g. FERRULE_REDIS_PORT=6380.

use async_trait::async_trait;
use ferrule::ferrule_redis::MemoryConnector;
use ferrule::logging::LogConfig;
use ferrule::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct Counter {
    redis: Arc<Redis>,
}

#[async_trait]
impl RequestHandler for Counter {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, Error> {
        let path = ctx.request().path.clone();
        match path.as_str() {
            "/" => {
                let remember = ctx.request().query("remember").is_some();
                let session = ctx
                    .session_mut()
                    .ok_or_else(|| Error::Internal("no session".into()))?;
                let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
                session.insert("visits", visits)?;
                if remember {
                    session.set_permanent(true);
                }
                Ok(HttpResponse::ok().with_text(format!("visit #{}\n", visits)))
            }
            "/reset" => {
                if let Some(session) = ctx.session_mut() {
                    session.clear();
                }
                Ok(HttpResponse::ok().with_text("forgotten\n"))
            }
            "/hits" => {
                // Global counter through the request's own connection
                let conn = self.redis.get_connection(ctx).await?;
                let hits = conn
                    .get_string("demo:hits")
                    .await?
                    .and_then(|raw| raw.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1;
                conn.set_ex("demo:hits", hits.to_string().as_bytes(), Duration::from_secs(3600))
                    .await?;
                Ok(HttpResponse::ok().with_text(format!("{} hits\n", hits)))
            }
            _ => Ok(HttpResponse::not_found()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigManager::with_prefix("FERRULE_");
    config.load_dotenv(None)?;
    config.set_default("REDIS_SESSIONS", true)?;
    config.set_default("LOG_FORMAT", "pretty")?;

    let _guard = LogConfig::from_config(&config)?.init()?;

    let mut app = Application::new(config)?;
    let redis = if std::env::args().any(|arg| arg == "--memory") {
        warn!("Using the in-memory store; sessions are lost on restart");
        ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new()))?
    } else {
        ferrule::init_app(&mut app)?
    };

    let addr: SocketAddr = "127.0.0.1:3000".parse()?;
    info!(%addr, redis = %redis.settings().redacted_url(), "Try: curl -c jar -b jar http://{}/", addr);

    Arc::new(app).serve(addr, Arc::new(Counter { redis })).await?;
    Ok(())
}
