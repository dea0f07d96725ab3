//! Server-side session state and the pluggable session interface.
//!
//! A [`Session`] is a string-keyed map of JSON values plus three flags:
//! `new` (no valid id was presented), `modified` (set by every mutating
//! method) and `permanent` (selects the long cookie lifetime).
//!
//! Where sessions live is decided by the application's
//! [`SessionInterface`]. The default [`NullSessionInterface`] keeps nothing.

use crate::context::RequestContext;
use crate::settings::AppSettings;
use crate::{Error, HttpResponse};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// Session contents
pub type SessionData = BTreeMap<String, Value>;

/// Key that stored records use for the permanent flag. Sessions refuse to
/// hold it as data.
pub const PERMANENT_KEY: &str = "_permanent";

fn check_key(key: &str) -> Result<(), Error> {
    if key == PERMANENT_KEY {
        return Err(Error::Serialization(format!(
            "session key {:?} is reserved",
            PERMANENT_KEY
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    sid: String,
    data: SessionData,
    new: bool,
    modified: bool,
    permanent: bool,
}

impl Session {
    /// A fresh, empty session for a client that presented no usable id.
    pub fn new(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            data: SessionData::new(),
            new: true,
            modified: false,
            permanent: false,
        }
    }

    /// A session loaded from storage. Starts unmodified.
    pub fn from_record(sid: impl Into<String>, data: SessionData, permanent: bool) -> Self {
        Self {
            sid: sid.into(),
            data,
            new: false,
            modified: false,
            permanent,
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Emptiness looks at the data only; the permanent flag does not count.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Typed read. `None` if missing or not convertible to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, Error> {
        let value = serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.insert_value(key, value)
    }

    /// Fails for [`PERMANENT_KEY`]; use [`Session::set_permanent`].
    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>, Error> {
        let key = key.into();
        check_key(&key)?;
        self.modified = true;
        Ok(self.data.insert(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.modified = true;
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.modified = true;
        self.data.clear();
    }

    pub fn set_permanent(&mut self, permanent: bool) {
        self.modified = true;
        self.permanent = permanent;
    }

    /// Mutable access to a value, inserting `null` if missing.
    pub fn entry_mut(&mut self, key: impl Into<String>) -> Result<&mut Value, Error> {
        let key = key.into();
        check_key(&key)?;
        self.modified = true;
        Ok(self.data.entry(key).or_insert(Value::Null))
    }

    /// Flag the session as changed after in-place edits of nested values.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }
}

/// Loads a session at the start of a request and persists it at the end.
#[async_trait]
pub trait SessionInterface: Send + Sync {
    async fn open_session(
        &self,
        app: &AppSettings,
        ctx: &mut RequestContext,
    ) -> Result<Session, Error>;

    async fn save_session(
        &self,
        app: &AppSettings,
        ctx: &mut RequestContext,
        session: &Session,
        response: &mut HttpResponse,
    ) -> Result<(), Error>;
}

/// Hands out throwaway sessions and never persists them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSessionInterface;

#[async_trait]
impl SessionInterface for NullSessionInterface {
    async fn open_session(
        &self,
        _app: &AppSettings,
        _ctx: &mut RequestContext,
    ) -> Result<Session, Error> {
        Ok(Session::new(String::new()))
    }

    async fn save_session(
        &self,
        _app: &AppSettings,
        _ctx: &mut RequestContext,
        _session: &Session,
        _response: &mut HttpResponse,
    ) -> Result<(), Error> {
        Ok(())
    }
}
