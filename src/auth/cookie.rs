// Session cookie handling
use axum::http::{header, HeaderMap, HeaderValue};

use crate::config::SecurityConfig;

pub const SESSION_COOKIE: &str = "jwt";

/// Value written on logout; never a valid token
pub const LOGGED_OUT: &str = "loggedout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
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

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age_secs: Option<i64>,
}

impl CookieConfig {
    /// The `jwt` session cookie, lifetime taken from the cookie expiry setting
    pub fn session(security: &SecurityConfig) -> Self {
        Self {
            name: SESSION_COOKIE.to_string(),
            secure: security.secure_cookies,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age_secs: Some(security.jwt_cookie_expiry_days as i64 * 24 * 60 * 60),
        }
    }

    /// Short-lived placeholder that overwrites the session on logout
    pub fn logout(security: &SecurityConfig) -> Self {
        Self {
            max_age_secs: Some(10),
            ..Self::session(security)
        }
    }

    pub fn build_set_cookie(&self, value: &str) -> String {
        let mut cookie = format!("{}={}", self.name, value);

        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        cookie.push_str(&format!("; Path={}", self.path));

        if let Some(max_age) = self.max_age_secs {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }

        cookie
    }

    pub fn header_value(&self, value: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.build_set_cookie(value)).ok()
    }
}

/// Extract a cookie value from request headers
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn session_cookie_attributes() {
        let mut security = AppConfig::testing().security;
        security.jwt_cookie_expiry_days = 90;
        let cookie = CookieConfig::session(&security).build_set_cookie("abc.def.ghi");
        assert!(cookie.starts_with("jwt=abc.def.ghi"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=7776000"));

        security.secure_cookies = true;
        assert!(CookieConfig::session(&security).build_set_cookie("x").contains("; Secure"));
    }

    #[test]
    fn logout_cookie_expires_quickly() {
        let cookie = CookieConfig::logout(&AppConfig::testing().security).build_set_cookie(LOGGED_OUT);
        assert!(cookie.starts_with("jwt=loggedout"));
        assert!(cookie.contains("Max-Age=10"));
    }

    #[test]
    fn extracts_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar; jwt=abc123; other=xyz"));
        assert_eq!(extract_cookie(&headers, "jwt"), Some("abc123".to_string()));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }
}
