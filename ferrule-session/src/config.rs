//! Session store configuration.

use crate::error::{SessionError, SessionResult};
use ferrule_config::ConfigManager;
use std::str::FromStr;
use std::time::Duration;

/// Configuration keys read by the session store
pub mod keys {
    pub const SESSION_KEY_PREFIX: &str = "SESSION_KEY_PREFIX";
    pub const SESSION_DEFAULT_TTL: &str = "SESSION_DEFAULT_TTL";
    pub const SESSION_ON_CORRUPT: &str = "SESSION_ON_CORRUPT";
}

pub const DEFAULT_KEY_PREFIX: &str = "session:";

/// One day
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What to do with a stored record that cannot be deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptPolicy {
    /// Log, delete the record and start a fresh session
    #[default]
    Reset,
    /// Fail the request
    Fail,
}

impl CorruptPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorruptPolicy::Reset => "reset",
            CorruptPolicy::Fail => "fail",
        }
    }
}

impl FromStr for CorruptPolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reset" => Ok(CorruptPolicy::Reset),
            "fail" => Ok(CorruptPolicy::Fail),
            other => Err(SessionError::Config(format!(
                "{} must be \"reset\" or \"fail\", got {:?}",
                keys::SESSION_ON_CORRUPT,
                other
            ))),
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStoreConfig {
    /// Prepended to every record key
    pub prefix: String,
    /// Lifetime of non-permanent sessions
    pub default_ttl: Duration,
    pub on_corrupt: CorruptPolicy,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL,
            on_corrupt: CorruptPolicy::default(),
        }
    }
}

impl SessionStoreConfig {
    /// Register defaults for the `SESSION_*` store keys that are unset.
    pub fn apply_defaults(config: &ConfigManager) -> SessionResult<()> {
        config.set_default(keys::SESSION_KEY_PREFIX, DEFAULT_KEY_PREFIX)?;
        config.set_default(keys::SESSION_DEFAULT_TTL, DEFAULT_TTL.as_secs())?;
        config.set_default(keys::SESSION_ON_CORRUPT, CorruptPolicy::default().as_str())?;
        Ok(())
    }

    pub fn from_config(config: &ConfigManager) -> SessionResult<Self> {
        let defaults = Self::default();

        let default_ttl = match config.get_opt::<u64>(keys::SESSION_DEFAULT_TTL)? {
            Some(0) => {
                return Err(SessionError::Config(format!(
                    "{} must be at least one second",
                    keys::SESSION_DEFAULT_TTL
                )));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.default_ttl,
        };

        let on_corrupt = match config.get_opt::<String>(keys::SESSION_ON_CORRUPT)? {
            Some(raw) => raw.parse()?,
            None => defaults.on_corrupt,
        };

        Ok(Self {
            prefix: config
                .get_opt(keys::SESSION_KEY_PREFIX)?
                .unwrap_or(defaults.prefix),
            default_ttl,
            on_corrupt,
        })
    }

    /// Set the record key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the lifetime of non-permanent sessions.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_on_corrupt(mut self, policy: CorruptPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    /// Storage key for a session id: `<prefix><sid>:data`
    pub fn record_key(&self, sid: &str) -> String {
        format!("{}{}:data", self.prefix, sid)
    }
}
