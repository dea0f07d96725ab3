//! Application configuration for ferrule.
//!
//! [`ConfigManager`] is a shared key → JSON value map. Extensions register
//! their defaults with [`ConfigManager::set_default`], which never overwrites
//! a value the application (or an earlier registration) already put there,
//! and then resolve the keys they own into typed settings once at startup.
//!
//! ```
//! use ferrule_config::ConfigManager;
//!
//! let config = ConfigManager::new();
//! config.set("REDIS_HOST", "10.0.0.5").unwrap();
//!
//! config.set_default("REDIS_HOST", "localhost").unwrap();
//! config.set_default("REDIS_PORT", 6379).unwrap();
//!
//! assert_eq!(config.get_string("REDIS_HOST").unwrap(), "10.0.0.5");
//! assert_eq!(config.get::<u16>("REDIS_PORT").unwrap(), 6379);
//! ```

pub mod env;
pub mod error;
pub mod loader;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Main configuration manager
#[derive(Clone, Default)]
pub struct ConfigManager {
    values: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            values: Arc::default(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Build a manager pre-populated from `(key, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let manager = Self::new();
        {
            let mut values = manager.values.write();
            for (key, value) in pairs {
                values.insert(key.into(), value);
            }
        }
        Ok(manager)
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;
        debug!(count = env_vars.len(), "Loaded configuration from environment");

        let mut values = self.values.write();
        for (key, value) in env_vars {
            values.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Load a `.env` file into the process environment, then [`Self::load_env`].
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing .env is fine.
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Load configuration from a JSON, TOML or `.env` file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loaded = ConfigLoader::auto(path)?.load_file(path)?;
        debug!(path = %path.display(), count = loaded.len(), "Loaded configuration file");

        self.values.write().extend(loaded);
        Ok(())
    }

    /// Set a configuration value, replacing any existing one
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = to_value(value)?;
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    /// Set `key` only if it has no value yet.
    ///
    /// Returns `true` when the default was applied.
    pub fn set_default<T: serde::Serialize>(&self, key: &str, value: T) -> Result<bool> {
        let mut values = self.values.write();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), to_value(value)?);
        Ok(true)
    }

    /// Raw JSON value for `key`
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Get a configuration value.
    ///
    /// String values that do not deserialize directly are retried as JSON
    /// scalars, so `"6379"` read from the environment yields a `u16`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .get_value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        coerce(key, value)
    }

    /// Like [`Self::get`], but a missing key or a `null` value is `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => coerce(key, value).map(Some),
        }
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Get all configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager; `other` wins on conflicts.
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.values, &other.values) {
            return;
        }
        let incoming = other.values.read().clone();
        self.values.write().extend(incoming);
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("keys", &self.values.read().len())
            .field("env_prefix", &self.env_prefix)
            .finish()
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ConfigError::SerializationError(e.to_string()))
}

fn coerce<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    let fallback = match &value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    };

    serde_json::from_value(value).or_else(|err| {
        fallback
            .and_then(|raw| serde_json::from_str(raw.trim()).ok())
            .ok_or_else(|| ConfigError::invalid(key, err.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("REDIS_HOST", "cache").unwrap();

        let value: String = manager.get("REDIS_HOST").unwrap();
        assert_eq!(value, "cache");
    }

    #[test]
    fn test_set_default_does_not_overwrite() {
        let manager = ConfigManager::new();
        manager.set("REDIS_PORT", 6380).unwrap();

        assert!(!manager.set_default("REDIS_PORT", 6379).unwrap());
        assert!(manager.set_default("REDIS_DB", 0).unwrap());
        assert!(!manager.set_default("REDIS_DB", 5).unwrap());

        assert_eq!(manager.get::<u16>("REDIS_PORT").unwrap(), 6380);
        assert_eq!(manager.get::<u8>("REDIS_DB").unwrap(), 0);
    }

    #[test]
    fn test_null_default_counts_as_present() {
        let manager = ConfigManager::new();
        manager.set_default("REDIS_PASSWORD", Option::<String>::None).unwrap();

        assert!(manager.has("REDIS_PASSWORD"));
        assert_eq!(manager.get_opt::<String>("REDIS_PASSWORD").unwrap(), None);
        assert!(!manager.set_default("REDIS_PASSWORD", "late").unwrap());
    }

    #[test]
    fn test_string_coercion() {
        let manager = ConfigManager::from_pairs([
            ("REDIS_PORT", json!("6380")),
            ("REDIS_DECODE_RESPONSES", json!("true")),
            ("REDIS_SOCKET_TIMEOUT", json!(" 2.5 ")),
        ])
        .unwrap();

        assert_eq!(manager.get::<u16>("REDIS_PORT").unwrap(), 6380);
        assert!(manager.get_bool("REDIS_DECODE_RESPONSES").unwrap());
        assert_eq!(manager.get::<f64>("REDIS_SOCKET_TIMEOUT").unwrap(), 2.5);
        // plain strings still come back as strings
        assert_eq!(manager.get_string("REDIS_PORT").unwrap(), "6380");
    }

    #[test]
    fn test_invalid_value() {
        let manager = ConfigManager::from_pairs([("REDIS_PORT", json!("not-a-port"))]).unwrap();
        assert!(matches!(
            manager.get::<u16>("REDIS_PORT"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_key() {
        let manager = ConfigManager::new();
        assert!(matches!(
            manager.get::<String>("NOPE"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert_eq!(manager.get_or("NOPE", 7u8), 7);
    }

    #[test]
    fn test_clones_share_state() {
        let manager = ConfigManager::new();
        let handle = manager.clone();
        handle.set("SERVER_NAME", "example.com").unwrap();
        assert!(manager.has("SERVER_NAME"));
    }

    #[test]
    fn test_merge() {
        let base = ConfigManager::new();
        base.set("A", 1).unwrap();
        base.set("B", 1).unwrap();

        let overlay = ConfigManager::new();
        overlay.set("B", 2).unwrap();

        base.merge(&overlay);
        base.merge(&base.clone());
        assert_eq!(base.get::<i32>("A").unwrap(), 1);
        assert_eq!(base.get::<i32>("B").unwrap(), 2);
    }
}
