// Framework-level settings resolved from configuration

use crate::cookie::SameSite;
use crate::Error;
use ferrule_config::ConfigManager;
use serde_json::Value;
use std::time::Duration;

/// Configuration keys owned by the framework
pub mod keys {
    pub const SESSION_COOKIE_NAME: &str = "SESSION_COOKIE_NAME";
    pub const SESSION_COOKIE_DOMAIN: &str = "SESSION_COOKIE_DOMAIN";
    pub const SESSION_COOKIE_PATH: &str = "SESSION_COOKIE_PATH";
    pub const SESSION_COOKIE_SECURE: &str = "SESSION_COOKIE_SECURE";
    pub const SESSION_COOKIE_SAMESITE: &str = "SESSION_COOKIE_SAMESITE";
    pub const PERMANENT_SESSION_LIFETIME: &str = "PERMANENT_SESSION_LIFETIME";
    pub const SERVER_NAME: &str = "SERVER_NAME";
    pub const APPLICATION_ROOT: &str = "APPLICATION_ROOT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

/// 31 days
pub const DEFAULT_PERMANENT_SESSION_LIFETIME: u64 = 31 * 24 * 60 * 60;

/// 100 years. Cookie expiry dates must stay representable.
pub const MAX_PERMANENT_SESSION_LIFETIME: u64 = 100 * 365 * 24 * 60 * 60;

/// Resolved framework settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub session_cookie_name: String,
    pub session_cookie_domain: Option<String>,
    pub session_cookie_path: Option<String>,
    pub session_cookie_secure: bool,
    pub session_cookie_samesite: Option<SameSite>,
    pub permanent_session_lifetime: Duration,
    pub server_name: Option<String>,
    pub application_root: String,
}

impl AppSettings {
    /// Register framework defaults without touching keys already set.
    pub fn apply_defaults(config: &ConfigManager) -> Result<(), Error> {
        config.set_default(keys::SESSION_COOKIE_NAME, "session")?;
        config.set_default(keys::SESSION_COOKIE_DOMAIN, Value::Null)?;
        config.set_default(keys::SESSION_COOKIE_PATH, Value::Null)?;
        config.set_default(keys::SESSION_COOKIE_SECURE, false)?;
        config.set_default(keys::SESSION_COOKIE_SAMESITE, Value::Null)?;
        config.set_default(
            keys::PERMANENT_SESSION_LIFETIME,
            DEFAULT_PERMANENT_SESSION_LIFETIME,
        )?;
        config.set_default(keys::SERVER_NAME, Value::Null)?;
        config.set_default(keys::APPLICATION_ROOT, "/")?;
        config.set_default(keys::LOG_LEVEL, "info")?;
        config.set_default(keys::LOG_FORMAT, "json")?;
        Ok(())
    }

    pub fn from_config(config: &ConfigManager) -> Result<Self, Error> {
        let same_site = config
            .get_opt::<String>(keys::SESSION_COOKIE_SAMESITE)?
            .map(|raw| raw.parse::<SameSite>().map_err(Error::Config))
            .transpose()?;

        let lifetime = config
            .get_opt::<u64>(keys::PERMANENT_SESSION_LIFETIME)?
            .unwrap_or(DEFAULT_PERMANENT_SESSION_LIFETIME);
        if lifetime == 0 || lifetime > MAX_PERMANENT_SESSION_LIFETIME {
            return Err(Error::Config(format!(
                "{} must be between 1 and {} seconds, got {}",
                keys::PERMANENT_SESSION_LIFETIME,
                MAX_PERMANENT_SESSION_LIFETIME,
                lifetime
            )));
        }

        Ok(Self {
            session_cookie_name: config
                .get_opt(keys::SESSION_COOKIE_NAME)?
                .unwrap_or_else(|| "session".to_string()),
            session_cookie_domain: config.get_opt(keys::SESSION_COOKIE_DOMAIN)?,
            session_cookie_path: config.get_opt(keys::SESSION_COOKIE_PATH)?,
            session_cookie_secure: config
                .get_opt(keys::SESSION_COOKIE_SECURE)?
                .unwrap_or(false),
            session_cookie_samesite: same_site,
            permanent_session_lifetime: Duration::from_secs(lifetime),
            server_name: config.get_opt(keys::SERVER_NAME)?,
            application_root: config
                .get_opt(keys::APPLICATION_ROOT)?
                .unwrap_or_else(|| "/".to_string()),
        })
    }

    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    /// Domain for the session cookie.
    ///
    /// Falls back to `SERVER_NAME` without its port. `localhost` yields no
    /// domain since browsers reject it.
    pub fn cookie_domain(&self) -> Option<String> {
        if let Some(domain) = &self.session_cookie_domain {
            return Some(domain.clone());
        }

        let server_name = self.server_name.as_deref()?;
        let host = server_name
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map_or(server_name, |(host, _)| host);

        if host.is_empty() || host == "localhost" {
            None
        } else {
            Some(host.to_string())
        }
    }

    /// Path for the session cookie
    pub fn cookie_path(&self) -> String {
        self.session_cookie_path
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| Some(self.application_root.clone()).filter(|p| !p.is_empty()))
            .unwrap_or_else(|| "/".to_string())
    }

    pub fn cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    pub fn cookie_samesite(&self) -> Option<SameSite> {
        self.session_cookie_samesite
    }

    pub fn permanent_session_lifetime(&self) -> Duration {
        self.permanent_session_lifetime
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            session_cookie_name: "session".to_string(),
            session_cookie_domain: None,
            session_cookie_path: None,
            session_cookie_secure: false,
            session_cookie_samesite: None,
            permanent_session_lifetime: Duration::from_secs(DEFAULT_PERMANENT_SESSION_LIFETIME),
            server_name: None,
            application_root: "/".to_string(),
        }
    }
}
