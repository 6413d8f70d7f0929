//! Cookie parsing and Set-Cookie construction.

use axum::http::{HeaderValue, header};

use crate::config::BridgeConfig;

/// Cookie carrying the identity provider's opaque session id.
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// Set-Cookie value for the service-token cookie.
pub fn service_cookie(config: &BridgeConfig, token: &str) -> String {
    let secure = if config.secure_cookies() {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        config.cookie_name,
        token,
        config.cookie_ttl.as_secs(),
        secure
    )
}

/// Set-Cookie value that deletes a cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}", name, secure)
}

/// Append a Set-Cookie header, skipping values that are not valid header text.
pub fn append_set_cookie(headers: &mut axum::http::HeaderMap, cookie: &str) -> bool {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
            true
        }
        Err(_) => false,
    }
}
