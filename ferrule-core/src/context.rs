//! Per-request context.
//!
//! A [`RequestContext`] lives for exactly one request. Besides the request
//! and its session it carries a [`Resources`] table where request-scoped
//! collaborators cache state under their own [`ResourceKey`]. Everything in
//! the table is dropped with the context.

use crate::http::HttpRequest;
use crate::session::Session;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_RESOURCE_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a request context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Identity under which a collaborator caches per-context state.
///
/// Every call to [`ResourceKey::new`] yields a distinct key, so two
/// collaborators of the same type never share a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey(u64);

impl ResourceKey {
    pub fn new() -> Self {
        Self(NEXT_RESOURCE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ResourceKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased, context-local storage
#[derive(Default)]
pub struct Resources {
    slots: HashMap<ResourceKey, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    pub fn contains(&self, key: ResourceKey) -> bool {
        self.slots.contains_key(&key)
    }

    /// Store `value`, dropping whatever was there before.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: ResourceKey, value: T) {
        self.slots.insert(key, Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: ResourceKey) -> Option<&T> {
        self.slots.get(&key)?.downcast_ref()
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self, key: ResourceKey) -> Option<&mut T> {
        self.slots.get_mut(&key)?.downcast_mut()
    }

    /// Take the value out of the table.
    ///
    /// A slot holding a different type is left untouched.
    pub fn take<T: Any + Send + Sync>(&mut self, key: ResourceKey) -> Option<T> {
        let slot = self.slots.remove(&key)?;
        match slot.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.slots.insert(key, other);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// State for a single in-flight request
#[derive(Debug)]
pub struct RequestContext {
    id: ContextId,
    request: HttpRequest,
    session: Option<Session>,
    resources: Resources,
}

impl RequestContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            id: ContextId::next(),
            request,
            session: None,
            resources: Resources::default(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The session opened for this request, if the session interface ran
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }
}
