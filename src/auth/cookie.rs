//! Refresh token cookie handling.

use axum::http::header;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Path the refresh cookie is scoped to; only the auth endpoints need it.
const REFRESH_COOKIE_PATH: &str = "/api/auth";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build the `Set-Cookie` value carrying a refresh token.
pub fn refresh_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}{}",
        REFRESH_COOKIE_NAME, token, REFRESH_COOKIE_PATH, max_age, secure
    )
}

/// Build the `Set-Cookie` value that removes the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh_token=abc123"),
        );

        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; refresh_token=xyz789; theme=dark"),
        );

        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
        assert_eq!(get_cookie(&headers, "theme"), Some("dark"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = axum::http::HeaderMap::new();
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE_NAME), None);
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("tok", 60, true);
        assert!(cookie.starts_with("refresh_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.ends_with("; Secure"));

        assert!(!refresh_cookie("tok", 60, false).contains("Secure"));
        assert!(clear_refresh_cookie(false).contains("Max-Age=0"));
    }
}
