// Test assertions for HTTP responses

use crate::TestResponse;
use ferrule_core::SetCookie;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        actual,
        response.body_string()
    );
}

/// Assert that a response body contains JSON matching expected value
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = response
        .body_json()
        .expect("Failed to deserialize response body");
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response has a specific header
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key).map(|s| s.as_str());
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert that the response sets `name` to a value, and return the cookie
pub fn assert_cookie_set<'a>(response: &'a TestResponse, name: &str) -> &'a SetCookie {
    match response.cookie(name) {
        Some(cookie) if !cookie.is_removal() => cookie,
        Some(_) => panic!("Expected cookie '{}' to be set, but it was cleared", name),
        None => panic!("Expected cookie '{}' to be set, but it was not sent", name),
    }
}

/// Assert that the response tells the client to drop `name`
pub fn assert_cookie_cleared(response: &TestResponse, name: &str) {
    let cookie = response.cookie(name);
    assert!(
        cookie.is_some_and(SetCookie::is_removal),
        "Expected cookie '{}' to be cleared, got {:?}",
        name,
        cookie
    );
}

/// Assert that the response leaves `name` alone
pub fn assert_no_cookie(response: &TestResponse, name: &str) {
    let cookie = response.cookie(name);
    assert!(
        cookie.is_none(),
        "Expected no Set-Cookie for '{}', got {:?}",
        name,
        cookie
    );
}
