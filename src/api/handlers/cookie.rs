//! Refresh token cookie and bearer header helpers.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

use crate::api::state::{CookieConfig, REFRESH_COOKIE_NAME};

/// `HttpOnly` cookie carrying the refresh token for `max_age` seconds.
pub fn refresh_cookie(
    config: &CookieConfig,
    token: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&render(config, token, max_age.max(0)))
}

/// Expire the refresh token cookie.
pub fn clear_refresh_cookie(config: &CookieConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&render(config, "", 0))
}

fn render(config: &CookieConfig, value: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite={}; Max-Age={max_age}",
        config.same_site()
    );
    if let Some(domain) = config.domain() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    if config.secure() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// When the cookie appears more than once, the last occurrence wins.
pub fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| key.trim() == REFRESH_COOKIE_NAME)
        .last()
        .map(|(_, value)| value.trim().to_string())
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
