// Core library for the ferrule HTTP framework
// Request/response types, per-request contexts, sessions and the application lifecycle

pub mod application;
pub mod context;
pub mod cookie;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod session;
pub mod settings;

// Re-export commonly used types
pub use application::*;
pub use context::{ContextId, RequestContext, ResourceKey, Resources};
pub use cookie::{SameSite, SetCookie};
pub use error::*;
pub use http::*;
pub use lifecycle::{LifecycleResult, TeardownHook, TeardownHooks};
pub use session::*;
pub use settings::AppSettings;

pub type Result<T> = std::result::Result<T, Error>;
