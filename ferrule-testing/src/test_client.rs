// Test HTTP Client

use ferrule_core::{Application, HttpRequest, HttpResponse, RequestHandler, SetCookie};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Drives requests through an [`Application`] without a network.
///
/// Keeps a cookie jar like a browser would: `Set-Cookie`s from responses
/// are stored and sent back on later requests, and removal cookies drop
/// their entry.
pub struct TestClient {
    app: Arc<Application>,
    handler: Arc<dyn RequestHandler>,
    jar: Mutex<BTreeMap<String, String>>,
}

impl TestClient {
    /// Create a new test client
    pub fn new(app: Arc<Application>, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            app,
            handler,
            jar: Mutex::new(BTreeMap::new()),
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(HttpRequest::get(path)).await
    }

    /// Make a POST request
    pub async fn post(&self, path: &str, body: Vec<u8>) -> TestResponse {
        self.request(HttpRequest::post(path).with_body(body)).await
    }

    /// Send a request, attaching the jar unless it already has a `Cookie`
    pub async fn request(&self, mut request: HttpRequest) -> TestResponse {
        if request.header("cookie").is_none()
            && let Some(header) = self.cookie_header()
        {
            request = request.with_header("Cookie", header);
        }

        let response = self.app.handle(request, self.handler.as_ref()).await;
        self.store_cookies(&response);
        TestResponse::new(response)
    }

    /// Value currently held in the jar
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().get(name).cloned()
    }

    /// Plant a cookie, e.g. a forged session id
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.jar.lock().insert(name.into(), value.into());
    }

    pub fn remove_cookie(&self, name: &str) -> Option<String> {
        self.jar.lock().remove(name)
    }

    pub fn clear_cookies(&self) {
        self.jar.lock().clear();
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.jar.lock();
        if jar.is_empty() {
            return None;
        }
        let pairs: Vec<String> = jar
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }

    fn store_cookies(&self, response: &HttpResponse) {
        let mut jar = self.jar.lock();
        for cookie in &response.cookies {
            if cookie.is_removal() {
                jar.remove(&cookie.name);
            } else {
                jar.insert(cookie.name.clone(), cookie.value.clone());
            }
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    response: HttpResponse,
}

impl TestResponse {
    pub fn new(response: HttpResponse) -> Self {
        Self { response }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// Get the response body as string
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.response.body).into_owned()
    }

    /// Get the response body as JSON
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_slice(&self.response.body)
            .map_err(|e| format!("Deserialization error: {}", e))
    }

    /// Get a header value, ignoring case
    pub fn header(&self, key: &str) -> Option<&String> {
        self.response
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// The `Set-Cookie` sent for `name`, if any
    pub fn cookie(&self, name: &str) -> Option<&SetCookie> {
        self.response.cookie(name)
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn into_inner(self) -> HttpResponse {
        self.response
    }
}
