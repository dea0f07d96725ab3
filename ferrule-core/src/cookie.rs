// Cookie parsing and Set-Cookie rendering

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(format!("unknown SameSite value: {}", other)),
        }
    }
}

/// A cookie to be sent back to the client in a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            max_age: None,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// A cookie that tells the browser to drop `name` immediately.
    pub fn removal(name: impl Into<String>) -> Self {
        let mut cookie = Self::new(name, "");
        cookie.expires = DateTime::from_timestamp(0, 0);
        cookie.max_age = Some(0);
        cookie
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age.num_seconds());
        self
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Whether this cookie deletes the client's copy
    pub fn is_removal(&self) -> bool {
        self.max_age.is_some_and(|age| age <= 0)
            || self.expires.is_some_and(|at| at <= Utc::now())
    }

    /// Render the `Set-Cookie` header value
    pub fn render(&self) -> String {
        let mut cookie = format!("{}={}", self.name, self.value);

        if let Some(expires) = self.expires {
            cookie.push_str(&format!(
                "; Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }

        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }

        if let Some(ref domain) = self.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        if let Some(ref path) = self.path {
            cookie.push_str(&format!("; Path={}", path));
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }

        if let Some(same_site) = self.same_site {
            cookie.push_str(&format!("; SameSite={}", same_site.as_str()));
        }

        cookie
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Parse a `Cookie` request header into name → value.
///
/// Later duplicates win. Values wrapped in double quotes are unquoted.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_full_cookie() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        let cookie = SetCookie::new("session", "abc123")
            .with_expires(expires)
            .with_domain(Some("example.com".to_string()))
            .with_path("/app")
            .with_secure(true)
            .with_http_only(true)
            .with_same_site(Some(SameSite::Lax));

        assert_eq!(
            cookie.render(),
            "session=abc123; Expires=Wed, 02 Jan 2030 03:04:05 GMT; Domain=example.com; \
             Path=/app; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_removal_cookie() {
        let cookie = SetCookie::removal("session").with_path("/");
        assert!(cookie.is_removal());
        assert!(cookie.value.is_empty());
        let rendered = cookie.render();
        assert!(rendered.starts_with("session=; Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn test_future_cookie_is_not_removal() {
        let cookie =
            SetCookie::new("session", "x").with_expires(Utc::now() + Duration::days(1));
        assert!(!cookie.is_removal());
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("session=abc; theme=\"dark\"; ; broken; a=1; a=2");
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies["session"], "abc");
        assert_eq!(cookies["theme"], "dark");
        assert_eq!(cookies["a"], "2");
    }

    #[test]
    fn test_same_site_parsing() {
        assert_eq!("strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert_eq!("Lax".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert_eq!("NONE".parse::<SameSite>().unwrap(), SameSite::None);
        assert!("sometimes".parse::<SameSite>().is_err());
    }
}
