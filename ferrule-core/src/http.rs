// HTTP request and response types

use crate::cookie::{SetCookie, parse_cookie_header};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP request wrapper
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            query_params: HashMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Get a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, crate::Error> {
        serde_json::from_slice(&self.body).map_err(|e| crate::Error::Deserialization(e.to_string()))
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// All cookies sent with the request
    pub fn cookies(&self) -> HashMap<String, String> {
        self.header("cookie")
            .map(|header| parse_cookie_header(header))
            .unwrap_or_default()
    }

    /// A single request cookie
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub cookies: Vec<SetCookie>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            cookies: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    /// JSON error body for a framework error
    pub fn from_error(err: &crate::Error) -> Self {
        let status = err.status_code();
        let body = serde_json::json!({
            "error": err.to_string(),
            "status": status,
        });
        HttpResponse::new(status)
            .with_json(&body)
            .unwrap_or_else(|_| HttpResponse::internal_server_error())
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.body = text.into().into_bytes();
        self.headers.insert(
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Add a cookie, replacing an earlier one with the same name
    pub fn set_cookie(&mut self, cookie: SetCookie) {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
    }

    /// Instruct the client to drop `name` for the given domain and path
    pub fn delete_cookie(&mut self, name: &str, domain: Option<String>, path: &str) {
        self.set_cookie(SetCookie::removal(name).with_domain(domain).with_path(path));
    }

    /// The cookie queued under `name`, if any
    pub fn cookie(&self, name: &str) -> Option<&SetCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Rendered `Set-Cookie` header values
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies.iter().map(SetCookie::render).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_request_headers_are_case_insensitive() {
        let req = HttpRequest::get("/").with_header("X-Request-Id", "42");
        assert_eq!(req.header("x-request-id").unwrap(), "42");
        assert_eq!(req.header("X-REQUEST-ID").unwrap(), "42");
    }

    #[test]
    fn test_request_cookies() {
        let req = HttpRequest::get("/").with_header("Cookie", "session=abc; other=1");
        assert_eq!(req.cookie("session").as_deref(), Some("abc"));
        assert_eq!(req.cookies().len(), 2);
        assert!(HttpRequest::get("/").cookie("session").is_none());
    }

    #[test]
    fn test_request_json() {
        #[derive(Deserialize)]
        struct Body {
            n: u32,
        }
        let req = HttpRequest::post("/").with_body(br#"{"n": 3}"#.to_vec());
        assert_eq!(req.json::<Body>().unwrap().n, 3);

        let bad = HttpRequest::post("/").with_body(b"nope".to_vec());
        assert!(matches!(bad.json::<Body>(), Err(Error::Deserialization(_))));
    }

    #[test]
    fn test_set_cookie_replaces_same_name() {
        let mut res = HttpResponse::ok();
        res.set_cookie(SetCookie::new("session", "one"));
        res.set_cookie(SetCookie::new("theme", "dark"));
        res.set_cookie(SetCookie::new("session", "two"));

        assert_eq!(res.cookies.len(), 2);
        assert_eq!(res.cookie("session").unwrap().value, "two");
        assert_eq!(res.set_cookie_headers().len(), 2);
    }

    #[test]
    fn test_delete_cookie() {
        let mut res = HttpResponse::ok();
        res.delete_cookie("session", Some("example.com".to_string()), "/");

        let cookie = res.cookie("session").unwrap();
        assert!(cookie.is_removal());
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }

    #[test]
    fn test_error_response() {
        let res = HttpResponse::from_error(&Error::ServiceUnavailable("redis down".into()));
        assert_eq!(res.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(body["status"], 503);
        assert!(body["error"].as_str().unwrap().contains("redis down"));
    }
}
