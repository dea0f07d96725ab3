//! Redis-backed session interface.

use async_trait::async_trait;
use chrono::Utc;
use ferrule_config::ConfigManager;
use ferrule_core::{
    AppSettings, Application, Error as CoreError, HttpResponse, RequestContext, Session,
    SessionData, SessionInterface, SetCookie,
};
use ferrule_redis::{Redis, RedisError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{CorruptPolicy, SessionStoreConfig};
use crate::error::{SessionError, SessionResult};
use crate::serializer::{JsonSerializer, SessionSerializer};
use crate::sid::{SidGenerator, generate_sid};

/// Stores sessions in Redis under `<prefix><sid>:data`.
///
/// The session id travels in the cookie named by `SESSION_COOKIE_NAME`.
/// An id is only adopted when a record for it exists, so a client cannot
/// pick its own id. Store access goes through the request context's
/// connection from [`Redis::get_connection`].
pub struct RedisSessionInterface {
    redis: Arc<Redis>,
    config: SessionStoreConfig,
    serializer: Arc<dyn SessionSerializer>,
    sid_generator: SidGenerator,
}

impl RedisSessionInterface {
    pub fn builder(redis: Arc<Redis>) -> RedisSessionInterfaceBuilder {
        RedisSessionInterfaceBuilder::new(redis)
    }

    /// Interface with the JSON serializer and random ids.
    pub fn new(redis: Arc<Redis>, config: SessionStoreConfig) -> Self {
        Self::builder(redis).config(config).build()
    }

    /// Apply `SESSION_*` store defaults and resolve them from `config`.
    pub fn from_config(redis: Arc<Redis>, config: &ConfigManager) -> SessionResult<Self> {
        SessionStoreConfig::apply_defaults(config)?;
        let store = SessionStoreConfig::from_config(config)?;
        Ok(Self::new(redis, store))
    }

    /// Install as the application's session interface.
    pub fn init_app(app: &mut Application, redis: Arc<Redis>) -> SessionResult<Arc<Self>> {
        let interface = Arc::new(Self::from_config(redis, app.config())?);
        app.set_session_interface(interface.clone());
        debug!(prefix = %interface.config.prefix, "Redis sessions enabled");
        Ok(interface)
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    pub fn record_key(&self, sid: &str) -> String {
        self.config.record_key(sid)
    }

    pub fn generate_sid(&self) -> String {
        (self.sid_generator)()
    }

    /// Lifetime of the stored record and of the cookie.
    ///
    /// Permanent sessions live for `PERMANENT_SESSION_LIFETIME`, others for
    /// the store's default TTL.
    pub fn expiration(&self, app: &AppSettings, session: &Session) -> Duration {
        if session.is_permanent() {
            app.permanent_session_lifetime()
        } else {
            self.config.default_ttl
        }
    }

    fn fresh(&self) -> Session {
        Session::new(self.generate_sid())
    }

    async fn open(&self, app: &AppSettings, ctx: &mut RequestContext) -> SessionResult<Session> {
        let context = ctx.id();
        let Some(sid) = ctx
            .request()
            .cookie(app.session_cookie_name())
            .filter(|sid| !sid.is_empty())
        else {
            debug!(%context, "No session cookie, starting a new session");
            return Ok(self.fresh());
        };

        let key = self.record_key(&sid);
        let conn = self.redis.get_connection(ctx).await?;

        if !conn.exists(&key).await? {
            debug!(%context, "Unknown session id, starting a new session");
            return Ok(self.fresh());
        }

        let loaded = match conn.get(&key).await {
            Ok(Some(bytes)) => self.serializer.loads(&bytes),
            // Expired between the two calls
            Ok(None) => return Ok(self.fresh()),
            Err(RedisError::Decode(msg)) => Err(SessionError::Deserialization(msg)),
            Err(e) => return Err(e.into()),
        };

        match loaded {
            Ok((data, permanent)) => {
                debug!(%context, entries = data.len(), permanent, "Session loaded");
                Ok(Session::from_record(sid, data, permanent))
            }
            Err(e) if self.config.on_corrupt == CorruptPolicy::Reset => {
                warn!(%context, key = %key, error = %e, "Discarding corrupt session record");
                conn.delete(&key).await?;
                Ok(self.fresh())
            }
            Err(e) => Err(e),
        }
    }

    async fn save(
        &self,
        app: &AppSettings,
        ctx: &mut RequestContext,
        session: &Session,
        response: &mut HttpResponse,
    ) -> SessionResult<()> {
        let context = ctx.id();
        let key = self.record_key(session.sid());
        let name = app.session_cookie_name();
        let domain = app.cookie_domain();
        let path = app.cookie_path();

        let conn = self.redis.get_connection(ctx).await?;

        if session.is_empty() {
            conn.delete(&key).await?;
            if session.is_modified() {
                response.delete_cookie(name, domain, &path);
                debug!(%context, "Empty session removed");
            }
            return Ok(());
        }

        let ttl = self.expiration(app, session);
        let expires = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .ok_or_else(|| {
                SessionError::Config(format!(
                    "session lifetime of {}s is out of range",
                    ttl.as_secs()
                ))
            })?;
        let record = self.serializer.dumps(session.data(), session.is_permanent())?;
        conn.set_ex(&key, &record, ttl).await?;

        response.set_cookie(
            SetCookie::new(name, session.sid())
                .with_expires(expires)
                .with_http_only(true)
                .with_domain(domain)
                .with_path(path)
                .with_secure(app.cookie_secure())
                .with_same_site(app.cookie_samesite()),
        );

        debug!(
            %context,
            entries = session.len(),
            ttl_secs = ttl.as_secs(),
            "Session saved"
        );
        Ok(())
    }
}

#[async_trait]
impl SessionInterface for RedisSessionInterface {
    async fn open_session(
        &self,
        app: &AppSettings,
        ctx: &mut RequestContext,
    ) -> Result<Session, CoreError> {
        Ok(self.open(app, ctx).await?)
    }

    async fn save_session(
        &self,
        app: &AppSettings,
        ctx: &mut RequestContext,
        session: &Session,
        response: &mut HttpResponse,
    ) -> Result<(), CoreError> {
        Ok(self.save(app, ctx, session, response).await?)
    }
}

impl std::fmt::Debug for RedisSessionInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionInterface")
            .field("redis", &self.redis)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`RedisSessionInterface`].
pub struct RedisSessionInterfaceBuilder {
    redis: Arc<Redis>,
    config: SessionStoreConfig,
    serializer: Arc<dyn SessionSerializer>,
    sid_generator: SidGenerator,
}

impl RedisSessionInterfaceBuilder {
    pub fn new(redis: Arc<Redis>) -> Self {
        Self {
            redis,
            config: SessionStoreConfig::default(),
            serializer: Arc::new(JsonSerializer),
            sid_generator: Arc::new(generate_sid),
        }
    }

    pub fn config(mut self, config: SessionStoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn SessionSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Replace the random id source.
    pub fn sid_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.sid_generator = Arc::new(generator);
        self
    }

    pub fn build(self) -> RedisSessionInterface {
        RedisSessionInterface {
            redis: self.redis,
            config: self.config,
            serializer: self.serializer,
            sid_generator: self.sid_generator,
        }
    }
}

/// Store a record directly, bypassing a request. Used to seed sessions.
pub async fn store_record(
    interface: &RedisSessionInterface,
    ctx: &mut RequestContext,
    sid: &str,
    data: &SessionData,
    permanent: bool,
    ttl: Duration,
) -> SessionResult<()> {
    let key = interface.record_key(sid);
    let record = interface.serializer.dumps(data, permanent)?;
    let conn = interface.redis.get_connection(ctx).await?;
    conn.set_ex(&key, &record, ttl).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_core::{HttpRequest, SameSite};
    use ferrule_redis::{MemoryConnector, RedisSettings};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY: Duration = Duration::from_secs(86_400);

    struct Fixture {
        connector: MemoryConnector,
        interface: RedisSessionInterface,
        app: AppSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(SessionStoreConfig::default())
        }

        fn with_config(config: SessionStoreConfig) -> Self {
            let connector = MemoryConnector::new();
            let redis = Arc::new(Redis::new(
                RedisSettings::default(),
                Arc::new(connector.clone()),
            ));
            Self {
                connector,
                interface: RedisSessionInterface::new(redis, config),
                app: AppSettings::default(),
            }
        }

        fn context(&self, cookie: Option<&str>) -> RequestContext {
            let mut request = HttpRequest::get("/");
            if let Some(sid) = cookie {
                request = request.with_header("Cookie", format!("session={}", sid));
            }
            RequestContext::new(request)
        }

        fn seed(&self, sid: &str, record: &[u8]) {
            self.connector
                .insert_raw(format!("session:{}:data", sid), record.to_vec(), Some(DAY));
        }
    }

    #[tokio::test]
    async fn test_no_cookie_opens_new_session() {
        let fx = Fixture::new();
        let mut ctx = fx.context(None);

        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(session.is_new());
        assert!(session.is_empty());
        assert_eq!(session.sid().len(), 64);
        // No store access without a cookie
        assert_eq!(fx.connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_spoofed_id_is_not_adopted() {
        let fx = Fixture::new();
        let mut ctx = fx.context(Some("attacker-chosen"));

        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.sid(), "attacker-chosen");
    }

    #[tokio::test]
    async fn test_existing_record_is_loaded() {
        let fx = Fixture::new();
        fx.seed("abc", br#"{"a":"test1","b":"test2"}"#);
        let mut ctx = fx.context(Some("abc"));

        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(!session.is_new());
        assert!(!session.is_modified());
        assert!(!session.is_permanent());
        assert_eq!(session.sid(), "abc");
        assert_eq!(session.len(), 2);
        assert_eq!(session.get::<String>("a").as_deref(), Some("test1"));
        assert_eq!(session.get::<String>("b").as_deref(), Some("test2"));
    }

    #[tokio::test]
    async fn test_permanent_record_sets_flag() {
        let fx = Fixture::new();
        fx.seed("perm", br#"{"user":1,"_permanent":true}"#);
        let mut ctx = fx.context(Some("perm"));

        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(session.is_permanent());
        assert!(!session.contains_key("_permanent"));
    }

    #[tokio::test]
    async fn test_corrupt_record_resets_by_default() {
        let fx = Fixture::new();
        fx.seed("bad", b"{not json");
        let mut ctx = fx.context(Some("bad"));

        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(session.is_new());
        assert_ne!(session.sid(), "bad");
        assert_eq!(fx.connector.raw("session:bad:data"), None);
    }

    #[tokio::test]
    async fn test_corrupt_record_fails_when_configured() {
        let fx = Fixture::with_config(
            SessionStoreConfig::default().with_on_corrupt(CorruptPolicy::Fail),
        );
        fx.seed("bad", b"[1,2]");
        let mut ctx = fx.context(Some("bad"));

        let err = fx.interface.open(&fx.app, &mut ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::Deserialization(_)));
        assert!(fx.connector.raw("session:bad:data").is_some());
    }

    #[tokio::test]
    async fn test_save_empty_modified_session_clears_cookie() {
        let fx = Fixture::new();
        fx.seed("abc", br#"{"a":1}"#);
        let mut ctx = fx.context(Some("abc"));

        let mut session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        session.clear();

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        assert_eq!(fx.connector.raw("session:abc:data"), None);
        let cookie = response.cookie("session").unwrap();
        assert!(cookie.is_removal());
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_save_empty_unmodified_session_leaves_cookie() {
        let fx = Fixture::new();
        let mut ctx = fx.context(None);
        let session = Session::new("fresh");
        fx.seed("fresh", b"{}");

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        assert_eq!(fx.connector.raw("session:fresh:data"), None);
        assert!(response.cookie("session").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_uses_one_day_ttl() {
        let fx = Fixture::new();
        let mut ctx = fx.context(None);
        let mut session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        session.insert("count", 1).unwrap();

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        let key = fx.interface.record_key(session.sid());
        assert_eq!(fx.connector.ttl(&key), Some(DAY));
        assert_eq!(fx.connector.raw(&key), Some(br#"{"count":1}"#.to_vec()));

        let cookie = response.cookie("session").unwrap();
        assert_eq!(cookie.value, session.sid());
        assert!(cookie.http_only);
        let remaining = cookie.expires.unwrap() - Utc::now();
        assert!((remaining.num_seconds() - 86_400).abs() <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_permanent_uses_app_lifetime() {
        let fx = Fixture::new();
        let mut ctx = fx.context(None);
        let mut session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        session.insert("user", "alice").unwrap();
        session.set_permanent(true);

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        let lifetime = fx.app.permanent_session_lifetime();
        let key = fx.interface.record_key(session.sid());
        assert_eq!(fx.connector.ttl(&key), Some(lifetime));

        let stored: serde_json::Value =
            serde_json::from_slice(&fx.connector.raw(&key).unwrap()).unwrap();
        assert_eq!(stored, json!({"user": "alice", "_permanent": true}));

        let remaining = response.cookie("session").unwrap().expires.unwrap() - Utc::now();
        assert!((remaining.num_seconds() - lifetime.as_secs() as i64).abs() <= 5);
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_writes_nothing() {
        let mut fx = Fixture::new();
        fx.app.permanent_session_lifetime = Duration::from_secs(10_000_000_000_000);
        let mut ctx = fx.context(None);
        let mut session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        session.insert("user", "alice").unwrap();
        session.set_permanent(true);

        let mut response = HttpResponse::ok();
        let err = fx
            .interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Config(_)));
        assert_eq!(fx.connector.raw(&fx.interface.record_key(session.sid())), None);
        assert!(response.cookie("session").is_none());
    }

    #[tokio::test]
    async fn test_reserved_key_cannot_clobber_session() {
        let fx = Fixture::new();
        let mut ctx = fx.context(None);
        let mut session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        session.insert("cart", 3).unwrap();
        assert!(session.insert("_permanent", "yes").is_err());

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        let mut ctx = fx.context(Some(session.sid()));
        let reopened = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert!(!reopened.is_new());
        assert_eq!(reopened.sid(), session.sid());
        assert_eq!(reopened.get::<u32>("cart"), Some(3));
        assert!(!reopened.is_permanent());
    }

    #[tokio::test]
    async fn test_cookie_attributes_follow_settings() {
        let mut fx = Fixture::new();
        fx.app.server_name = Some("example.com:8080".into());
        fx.app.session_cookie_path = Some("/app".into());
        fx.app.session_cookie_secure = true;
        fx.app.session_cookie_samesite = Some(SameSite::Lax);

        let mut ctx = fx.context(None);
        let mut session = Session::new("s1");
        session.insert("k", true).unwrap();

        let mut response = HttpResponse::ok();
        fx.interface
            .save(&fx.app, &mut ctx, &session, &mut response)
            .await
            .unwrap();

        let cookie = response.cookie("session").unwrap();
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/app"));
        assert!(cookie.secure);
        assert_eq!(cookie.same_site, Some(SameSite::Lax));
    }

    #[tokio::test]
    async fn test_custom_sid_generator() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = counter.clone();

        let connector = MemoryConnector::new();
        let redis = Arc::new(Redis::new(RedisSettings::default(), Arc::new(connector)));
        let interface = RedisSessionInterface::builder(redis)
            .sid_generator(move || format!("sid-{}", source.fetch_add(1, Ordering::SeqCst)))
            .build();

        let mut ctx = RequestContext::new(HttpRequest::get("/"));
        let a = interface.open(&AppSettings::default(), &mut ctx).await.unwrap();
        let b = interface.open(&AppSettings::default(), &mut ctx).await.unwrap();
        assert_eq!(a.sid(), "sid-0");
        assert_eq!(b.sid(), "sid-1");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        struct Down;

        #[async_trait]
        impl ferrule_redis::Connector for Down {
            async fn connect(
                &self,
                _settings: &RedisSettings,
            ) -> ferrule_redis::Result<Box<dyn ferrule_redis::KvStore>> {
                Err(RedisError::Connection("refused".into()))
            }
        }

        let redis = Arc::new(Redis::new(RedisSettings::default(), Arc::new(Down)));
        let interface = RedisSessionInterface::new(redis, SessionStoreConfig::default());
        let mut ctx = RequestContext::new(HttpRequest::get("/").with_header("Cookie", "session=x"));

        let err = interface
            .open_session(&AppSettings::default(), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_store_record_seeds_session() {
        let fx = Fixture::new();
        let mut data = SessionData::new();
        data.insert("role".into(), json!("admin"));

        let mut ctx = fx.context(None);
        store_record(&fx.interface, &mut ctx, "seeded", &data, false, DAY)
            .await
            .unwrap();

        let mut ctx = fx.context(Some("seeded"));
        let session = fx.interface.open(&fx.app, &mut ctx).await.unwrap();
        assert_eq!(session.get::<String>("role").as_deref(), Some("admin"));
    }
}
