//! Integration tests for common ferrule workflows.
//!
//! Requests run through the full lifecycle: open session, handler, save
//! session, teardown. The store is in memory.

use async_trait::async_trait;
use ferrule::ferrule_redis::{MemoryConnector, MemoryStore};
use ferrule::prelude::*;
use ferrule_testing::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

/// Small routing handler over the session and the request's connection.
struct Routes {
    redis: Arc<Redis>,
}

#[async_trait]
impl RequestHandler for Routes {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, Error> {
        let path = ctx.request().path.clone();
        match path.as_str() {
            "/count" => {
                let session = session(ctx)?;
                let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
                session.insert("visits", visits)?;
                Ok(HttpResponse::ok().with_text(visits.to_string()))
            }
            "/login" => {
                let session = session(ctx)?;
                session.insert("user", "alice")?;
                session.set_permanent(true);
                Ok(HttpResponse::no_content())
            }
            "/whoami" => {
                let user = session(ctx)?.get::<String>("user").unwrap_or_default();
                Ok(HttpResponse::ok().with_text(user))
            }
            "/logout" => {
                session(ctx)?.clear();
                Ok(HttpResponse::no_content())
            }
            "/cache" => {
                let first = self.redis.get_connection(ctx).await?.id();
                let conn = self.redis.get_connection(ctx).await?;
                conn.set_ex("cache:greeting", b"hello", Duration::from_secs(60))
                    .await?;
                let same = first == conn.id();
                session(ctx)?.insert("cached", true)?;
                HttpResponse::ok().with_json(&json!({ "same_connection": same }))
            }
            "/boom" => {
                self.redis.get_connection(ctx).await?;
                Err(Error::BadRequest("boom".into()))
            }
            _ => Ok(HttpResponse::not_found()),
        }
    }
}

fn session(ctx: &mut RequestContext) -> Result<&mut Session, Error> {
    ctx.session_mut()
        .ok_or_else(|| Error::Internal("session not opened".into()))
}

fn session_app() -> (TestApp, TestClient) {
    let app = TestAppBuilder::new().with_sessions().build().unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));
    (app, client)
}

fn record_key(sid: &str) -> String {
    format!("session:{}:data", sid)
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_session_persists_across_requests() {
    let (app, client) = session_app();

    let first = client.get("/count").await;
    assert_status(&first, 200);
    assert_body_contains(&first, "1");

    let cookie = assert_cookie_set(&first, "session");
    assert!(cookie.http_only);
    assert_eq!(cookie.value.len(), 64);
    let sid = cookie.value.clone();

    let second = client.get("/count").await;
    assert_body_contains(&second, "2");
    assert_eq!(assert_cookie_set(&second, "session").value, sid);

    let stored = app.store().raw(&record_key(&sid)).unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&stored).unwrap(),
        json!({"visits": 2})
    );
}

#[tokio::test]
async fn test_spoofed_session_id_is_replaced() {
    let (app, client) = session_app();
    client.set_cookie("session", "chosen-by-attacker");

    let response = client.get("/count").await;
    assert_body_contains(&response, "1");

    let issued = assert_cookie_set(&response, "session").value.clone();
    assert_ne!(issued, "chosen-by-attacker");
    assert!(app.store().raw(&record_key("chosen-by-attacker")).is_none());
    assert!(app.store().raw(&record_key(&issued)).is_some());
}

#[tokio::test]
async fn test_seeded_record_is_visible_to_handler() {
    let (app, client) = session_app();
    app.store().insert_raw(
        record_key("known"),
        br#"{"user":"bob","visits":4}"#.to_vec(),
        Some(Duration::from_secs(600)),
    );
    client.set_cookie("session", "known");

    assert_body_contains(&client.get("/whoami").await, "bob");
    let response = client.get("/count").await;
    assert_body_contains(&response, "5");
    assert_eq!(assert_cookie_set(&response, "session").value, "known");
}

#[tokio::test]
async fn test_logout_deletes_record_and_clears_cookie() {
    let (app, client) = session_app();
    client.get("/count").await;
    let sid = client.cookie("session").unwrap();

    let response = client.get("/logout").await;
    assert_status(&response, 204);
    assert_cookie_cleared(&response, "session");
    assert!(app.store().raw(&record_key(&sid)).is_none());
    assert_eq!(client.cookie("session"), None);
}

#[tokio::test]
async fn test_untouched_empty_session_sets_no_cookie() {
    let (app, client) = session_app();

    let response = client.get("/whoami").await;
    assert_status(&response, 200);
    assert_no_cookie(&response, "session");
    assert!(app.store().is_empty());
}

#[tokio::test]
async fn test_corrupt_record_starts_fresh_session() {
    let (app, client) = session_app();
    app.store()
        .insert_raw(record_key("broken"), b"{{{".to_vec(), None);
    client.set_cookie("session", "broken");

    let response = client.get("/count").await;
    assert_status(&response, 200);
    assert_body_contains(&response, "1");
    assert_ne!(assert_cookie_set(&response, "session").value, "broken");
    assert!(app.store().raw(&record_key("broken")).is_none());
}

#[tokio::test]
async fn test_corrupt_record_fails_request_when_configured() {
    let app = TestAppBuilder::new()
        .config("SESSION_ON_CORRUPT", "fail")
        .unwrap()
        .with_sessions()
        .build()
        .unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));
    app.store()
        .insert_raw(record_key("broken"), b"[]".to_vec(), None);
    client.set_cookie("session", "broken");

    let response = client.get("/count").await;
    assert_server_error(&response);
    assert_no_cookie(&response, "session");
}

// =============================================================================
// Expiration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_regular_session_lives_one_day() {
    let (app, client) = session_app();
    client.get("/count").await;
    let sid = client.cookie("session").unwrap();

    assert_eq!(
        app.store().ttl(&record_key(&sid)),
        Some(Duration::from_secs(86_400))
    );
}

#[tokio::test(start_paused = true)]
async fn test_permanent_session_uses_configured_lifetime() {
    let app = TestAppBuilder::new()
        .config("PERMANENT_SESSION_LIFETIME", 3_600)
        .unwrap()
        .with_sessions()
        .build()
        .unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));

    let response = client.get("/login").await;
    let cookie = assert_cookie_set(&response, "session");
    let key = record_key(&cookie.value);

    assert_eq!(app.store().ttl(&key), Some(Duration::from_secs(3_600)));
    let stored: serde_json::Value =
        serde_json::from_slice(&app.store().raw(&key).unwrap()).unwrap();
    assert_eq!(stored, json!({"user": "alice", "_permanent": true}));

    // Loaded back as permanent without the reserved key
    assert_body_contains(&client.get("/whoami").await, "alice");
}

#[tokio::test(start_paused = true)]
async fn test_expired_record_is_not_adopted() {
    let (_app, client) = session_app();
    client.get("/count").await;
    let sid = client.cookie("session").unwrap();

    tokio::time::advance(Duration::from_secs(86_401)).await;

    let response = client.get("/count").await;
    assert_body_contains(&response, "1");
    assert_ne!(assert_cookie_set(&response, "session").value, sid);
}

// =============================================================================
// Connections
// =============================================================================

#[tokio::test]
async fn test_one_connection_per_request() {
    let store = MemoryStore::new();
    let memory = MemoryConnector::with_store(store.clone());
    let counting = CountingConnector::new(Arc::new(memory.clone()));

    let app = TestAppBuilder::new()
        .with_store(store)
        .with_connector(Arc::new(counting.clone()))
        .with_sessions()
        .build()
        .unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));

    let response = client.get("/cache").await;
    assert_json(&response, &json!({"same_connection": true}));
    assert_eq!(counting.connects(), 1);
    assert_eq!(memory.closed(), 1);
    assert_eq!(app.store().raw("cache:greeting"), Some(b"hello".to_vec()));

    client.get("/cache").await;
    assert_eq!(counting.connects(), 2);
    assert_eq!(memory.closed(), 2);
}

#[tokio::test]
async fn test_connection_released_after_handler_error() {
    let memory = MemoryConnector::new();
    let app = TestAppBuilder::new()
        .with_connector(Arc::new(memory.clone()))
        .build()
        .unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));

    let response = client.get("/boom").await;
    assert_status(&response, 400);
    assert_eq!(memory.opened(), 1);
    assert_eq!(memory.closed(), 1);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_503() {
    let failing = FailingConnector::new();
    let app = TestAppBuilder::new()
        .with_connector(Arc::new(failing.clone()))
        .with_sessions()
        .build()
        .unwrap();
    let client = app.client(Arc::new(Routes {
        redis: app.redis.clone(),
    }));

    // Without a cookie the session opens offline; saving it fails
    let response = client.get("/count").await;
    assert_status(&response, 503);
    assert_no_cookie(&response, "session");

    // With a cookie the open itself fails
    client.set_cookie("session", "abc");
    assert_status(&client.get("/count").await, 503);
    assert_eq!(failing.attempts(), 2);
}

// =============================================================================
// Wiring
// =============================================================================

#[test]
fn test_init_app_installs_sessions_only_when_enabled() {
    let config = ConfigManager::new();
    let mut app = Application::new(config.clone()).unwrap();
    let redis = ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new())).unwrap();
    assert!(!redis.settings().sessions);
    assert!(!config.has("SESSION_KEY_PREFIX"));

    let config = ConfigManager::new();
    config.set("REDIS_SESSIONS", true).unwrap();
    let mut app = Application::new(config.clone()).unwrap();
    ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new())).unwrap();
    assert_eq!(
        config.get::<String>("SESSION_KEY_PREFIX").unwrap(),
        "session:"
    );
}

#[test]
fn test_init_app_keeps_configured_values() {
    let config = ConfigManager::new();
    config.set("REDIS_HOST", "cache.internal").unwrap();
    config.set("REDIS_PORT", "6380").unwrap();
    let mut app = Application::new(config.clone()).unwrap();

    let redis = ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new())).unwrap();
    assert_eq!(redis.settings().host, "cache.internal");
    assert_eq!(redis.settings().port, 6380);
    assert_eq!(config.get::<u32>("REDIS_DB").unwrap(), 0);

    // A second registration sees the same values, defaults are not reapplied
    config.set("REDIS_DB", 3).unwrap();
    let again = ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new())).unwrap();
    assert_eq!(again.settings().db, 3);
    assert_eq!(again.settings().host, "cache.internal");
}

#[test]
fn test_invalid_redis_config_is_rejected() {
    let config = ConfigManager::new();
    config.set("REDIS_ERRORS", "explode").unwrap();
    let mut app = Application::new(config).unwrap();
    assert!(ferrule::init_app_with(&mut app, Arc::new(MemoryConnector::new())).is_err());
}

#[test]
fn test_out_of_range_session_lifetime_is_rejected() {
    for lifetime in [0_u64, 10_000_000_000_000] {
        let built = TestAppBuilder::new()
            .config("PERMANENT_SESSION_LIFETIME", lifetime)
            .unwrap()
            .with_sessions()
            .build();
        assert!(built.is_err(), "accepted lifetime {lifetime}");
    }
}
