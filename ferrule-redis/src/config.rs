//! Redis settings.
//!
//! Settings are read from the application configuration under a fixed set
//! of `REDIS_*` keys. [`RedisSettings::apply_defaults`] registers a default
//! for every key that is still unset, then [`RedisSettings::from_config`]
//! resolves them into a typed value once.

use ferrule_config::ConfigManager;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::{RedisError, Result};

/// Configuration keys read by the connection manager
pub mod keys {
    pub const REDIS_HOST: &str = "REDIS_HOST";
    pub const REDIS_PORT: &str = "REDIS_PORT";
    pub const REDIS_DB: &str = "REDIS_DB";
    pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
    pub const REDIS_SOCKET_TIMEOUT: &str = "REDIS_SOCKET_TIMEOUT";
    pub const REDIS_CONNECTION_POOL: &str = "REDIS_CONNECTION_POOL";
    pub const REDIS_CHARSET: &str = "REDIS_CHARSET";
    pub const REDIS_ERRORS: &str = "REDIS_ERRORS";
    pub const REDIS_DECODE_RESPONSES: &str = "REDIS_DECODE_RESPONSES";
    pub const REDIS_UNIX_SOCKET_PATH: &str = "REDIS_UNIX_SOCKET_PATH";
    pub const REDIS_SESSIONS: &str = "REDIS_SESSIONS";
}

/// How invalid UTF-8 is handled when decoding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail with [`RedisError::Decode`].
    #[default]
    Strict,
    /// Substitute U+FFFD for each invalid sequence.
    Replace,
    /// Drop invalid sequences.
    Ignore,
}

impl DecodePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodePolicy::Strict => "strict",
            DecodePolicy::Replace => "replace",
            DecodePolicy::Ignore => "ignore",
        }
    }

    /// Decode `bytes` as UTF-8 under this policy.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            DecodePolicy::Strict => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| RedisError::Decode(e.to_string())),
            DecodePolicy::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
            DecodePolicy::Ignore => Ok(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()),
        }
    }
}

impl FromStr for DecodePolicy {
    type Err = RedisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(DecodePolicy::Strict),
            "replace" => Ok(DecodePolicy::Replace),
            "ignore" => Ok(DecodePolicy::Ignore),
            other => Err(RedisError::Config(format!(
                "unknown decode error policy: {}",
                other
            ))),
        }
    }
}

/// Resolved connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RedisSettings {
    /// TCP host.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Database index.
    pub db: u32,
    /// Password.
    pub password: Option<String>,
    /// Bounds connect and each command when set.
    pub socket_timeout: Option<Duration>,
    /// Maximum size of a shared bb8 pool. `None` opens a dedicated
    /// connection per request context.
    pub connection_pool: Option<u32>,
    /// Text charset. Only UTF-8 is supported.
    pub charset: String,
    /// Decode error policy.
    pub errors: DecodePolicy,
    /// Normalise fetched values through the charset and policy.
    pub decode_responses: bool,
    /// Connect over this unix socket instead of TCP.
    pub unix_socket_path: Option<String>,
    /// Install the Redis session interface.
    pub sessions: bool,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            socket_timeout: None,
            connection_pool: None,
            charset: "utf-8".to_string(),
            errors: DecodePolicy::Strict,
            decode_responses: false,
            unix_socket_path: None,
            sessions: false,
        }
    }
}

impl RedisSettings {
    /// Create a builder.
    pub fn builder() -> RedisSettingsBuilder {
        RedisSettingsBuilder::new()
    }

    /// Register a default for every `REDIS_*` key that is still unset.
    ///
    /// Values the application already configured are left alone, so calling
    /// this more than once is harmless.
    pub fn apply_defaults(config: &ConfigManager) -> Result<()> {
        config.set_default(keys::REDIS_HOST, "localhost")?;
        config.set_default(keys::REDIS_PORT, 6379)?;
        config.set_default(keys::REDIS_DB, 0)?;
        config.set_default(keys::REDIS_PASSWORD, Value::Null)?;
        config.set_default(keys::REDIS_SOCKET_TIMEOUT, Value::Null)?;
        config.set_default(keys::REDIS_CONNECTION_POOL, Value::Null)?;
        config.set_default(keys::REDIS_CHARSET, "utf-8")?;
        config.set_default(keys::REDIS_ERRORS, "strict")?;
        config.set_default(keys::REDIS_DECODE_RESPONSES, false)?;
        config.set_default(keys::REDIS_UNIX_SOCKET_PATH, Value::Null)?;
        config.set_default(keys::REDIS_SESSIONS, false)?;
        Ok(())
    }

    /// Resolve settings from configuration. Unset keys take the defaults.
    pub fn from_config(config: &ConfigManager) -> Result<Self> {
        let defaults = Self::default();

        let socket_timeout = match config.get_opt::<f64>(keys::REDIS_SOCKET_TIMEOUT)? {
            None => None,
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => {
                return Err(RedisError::Config(format!(
                    "{} must be a positive number of seconds, got {}",
                    keys::REDIS_SOCKET_TIMEOUT,
                    secs
                )));
            }
        };

        let connection_pool = match config.get_opt::<u32>(keys::REDIS_CONNECTION_POOL)? {
            Some(0) => {
                return Err(RedisError::Config(format!(
                    "{} must be at least 1",
                    keys::REDIS_CONNECTION_POOL
                )));
            }
            size => size,
        };

        let charset = config
            .get_opt::<String>(keys::REDIS_CHARSET)?
            .unwrap_or(defaults.charset);
        check_charset(&charset)?;

        let errors = match config.get_opt::<String>(keys::REDIS_ERRORS)? {
            Some(raw) => raw.parse()?,
            None => defaults.errors,
        };

        Ok(Self {
            host: config
                .get_opt(keys::REDIS_HOST)?
                .unwrap_or(defaults.host),
            port: config.get_opt(keys::REDIS_PORT)?.unwrap_or(defaults.port),
            db: config.get_opt(keys::REDIS_DB)?.unwrap_or(defaults.db),
            password: config
                .get_opt::<String>(keys::REDIS_PASSWORD)?
                .filter(|p| !p.is_empty()),
            socket_timeout,
            connection_pool,
            charset,
            errors,
            decode_responses: config
                .get_opt(keys::REDIS_DECODE_RESPONSES)?
                .unwrap_or(defaults.decode_responses),
            unix_socket_path: config
                .get_opt::<String>(keys::REDIS_UNIX_SOCKET_PATH)?
                .filter(|p| !p.is_empty()),
            sessions: config
                .get_opt(keys::REDIS_SESSIONS)?
                .unwrap_or(defaults.sessions),
        })
    }

    /// Get the full Redis URL with auth and database.
    ///
    /// TCP endpoints render as `redis://:<password>@<host>:<port>/<db>`;
    /// unix sockets as `redis+unix://<path>?db=<db>&pass=<password>`.
    pub fn connection_url(&self) -> Result<Url> {
        let invalid = |e: url::ParseError| RedisError::Config(format!("invalid Redis URL: {}", e));

        if let Some(path) = &self.unix_socket_path {
            let mut url = Url::parse("redis+unix:///").map_err(invalid)?;
            url.set_path(path);
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("db", &self.db.to_string());
                if let Some(password) = &self.password {
                    query.append_pair("pass", password);
                }
            }
            return Ok(url);
        }

        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url =
            Url::parse(&format!("redis://{}:{}/{}", host, self.port, self.db)).map_err(invalid)?;
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| RedisError::Config("cannot set password on Redis URL".to_string()))?;
        }
        Ok(url)
    }

    /// URL safe for logs: the password is masked
    pub fn redacted_url(&self) -> String {
        match self.connection_url() {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                if url.query().is_some_and(|q| q.contains("pass=")) {
                    let pairs: Vec<(String, String)> = url
                        .query_pairs()
                        .map(|(k, v)| {
                            let v = if k == "pass" { "***".into() } else { v.into_owned() };
                            (k.into_owned(), v)
                        })
                        .collect();
                    url.query_pairs_mut().clear().extend_pairs(pairs);
                }
                url.to_string()
            }
            Err(_) => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn check_charset(charset: &str) -> Result<()> {
    match charset.to_ascii_lowercase().replace('_', "-").as_str() {
        "utf-8" | "utf8" => Ok(()),
        other => Err(RedisError::Config(format!(
            "unsupported charset {:?}; only utf-8 is supported",
            other
        ))),
    }
}

/// Builder for Redis settings.
#[derive(Default)]
pub struct RedisSettingsBuilder {
    settings: RedisSettings,
}

impl RedisSettingsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.settings.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.settings.port = port;
        self
    }

    pub fn db(mut self, db: u32) -> Self {
        self.settings.db = db;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.settings.password = Some(password.into());
        self
    }

    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.settings.socket_timeout = Some(timeout);
        self
    }

    /// Check connections out of a shared pool of at most `max_size`.
    pub fn connection_pool(mut self, max_size: u32) -> Self {
        self.settings.connection_pool = Some(max_size);
        self
    }

    pub fn errors(mut self, policy: DecodePolicy) -> Self {
        self.settings.errors = policy;
        self
    }

    pub fn decode_responses(mut self, enabled: bool) -> Self {
        self.settings.decode_responses = enabled;
        self
    }

    pub fn unix_socket_path(mut self, path: impl Into<String>) -> Self {
        self.settings.unix_socket_path = Some(path.into());
        self
    }

    pub fn sessions(mut self, enabled: bool) -> Self {
        self.settings.sessions = enabled;
        self
    }

    /// Build the settings.
    pub fn build(self) -> RedisSettings {
        self.settings
    }
}
