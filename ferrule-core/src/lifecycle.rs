//! Request teardown hooks.
//!
//! Teardown hooks run once at the end of every request, after the response
//! has been produced and the session saved, whether the request succeeded
//! or not. They receive the error that ended the request, if any.
//!
//! ## Examples
//!
//! ```
//! use ferrule_core::lifecycle::{LifecycleResult, TeardownHook};
//! use ferrule_core::{Error, RequestContext};
//! use async_trait::async_trait;
//!
//! struct AuditLog;
//!
//! #[async_trait]
//! impl TeardownHook for AuditLog {
//!     async fn teardown(&self, ctx: &mut RequestContext, error: Option<&Error>) -> LifecycleResult {
//!         println!("{} finished, failed: {}", ctx.id(), error.is_some());
//!         Ok(())
//!     }
//! }
//! ```

use crate::Error;
use crate::context::RequestContext;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Error type for lifecycle operations
pub type LifecycleResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Hook called when a request context is torn down
#[async_trait]
pub trait TeardownHook: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Release whatever this hook cached in `ctx`
    async fn teardown(&self, ctx: &mut RequestContext, error: Option<&Error>) -> LifecycleResult;
}

/// Ordered set of teardown hooks
#[derive(Default, Clone)]
pub struct TeardownHooks {
    hooks: Vec<Arc<dyn TeardownHook>>,
}

impl TeardownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn TeardownHook>) {
        debug!(hook = hook.name(), "Registered teardown hook");
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in reverse registration order (LIFO).
    ///
    /// A failing hook is logged and does not stop the others.
    pub async fn run(&self, ctx: &mut RequestContext, error: Option<&Error>) -> usize {
        let mut failures = 0;

        for hook in self.hooks.iter().rev() {
            if let Err(e) = hook.teardown(ctx, error).await {
                warn!(hook = hook.name(), context = %ctx.id(), error = %e, "Teardown hook failed");
                failures += 1;
            }
        }

        failures
    }
}

impl std::fmt::Debug for TeardownHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}
