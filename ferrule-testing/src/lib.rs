//! Testing utilities for ferrule applications.
//!
//! ## Features
//!
//! - **TestApp** - Application wired to an in-memory store
//! - **TestClient** - In-process client with a cookie jar
//! - **Assertions** - Status, body and cookie checks
//! - **Mocks** - Failing and counting connectors, recording teardown hooks
//!
//! ## Quick Start
//!
//! ```no_run
//! use ferrule_core::{Error, HttpResponse, RequestContext, RequestHandler};
//! use ferrule_testing::*;
//! use std::sync::Arc;
//!
//! struct Visits;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler for Visits {
//!     async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, Error> {
//!         let session = ctx.session_mut().expect("session opened");
//!         let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
//!         session.insert("visits", visits)?;
//!         Ok(HttpResponse::ok().with_text(visits.to_string()))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let app = TestAppBuilder::new().with_sessions().build().unwrap();
//! let client = app.client(Arc::new(Visits));
//!
//! let response = client.get("/").await;
//! assert_status(&response, 200);
//! assert_cookie_set(&response, "session");
//! assert_body_contains(&client.get("/").await, "2");
//! # });
//! ```

mod assertions;
mod mock;
mod test_app;
mod test_client;

pub use assertions::{
    assert_body_contains, assert_cookie_cleared, assert_cookie_set, assert_header, assert_json,
    assert_no_cookie, assert_server_error, assert_status, assert_success,
};
pub use mock::{CountingConnector, FailingConnector, RecordingHook};
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestResponse};
