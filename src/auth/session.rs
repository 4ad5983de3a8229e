use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::{Cookie, SameSite};

use crate::config::CookieConfig;

pub const SESSION_COOKIE: &str = "token";

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(
    token: &str,
    cfg: &CookieConfig,
    ttl: Duration,
) -> anyhow::Result<HeaderValue> {
    let cookie = Cookie::build((SESSION_COOKIE, token.to_string()))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::try_from(ttl)?)
        .path("/")
        .build()
        .to_string();
    Ok(HeaderValue::from_str(&cookie)?)
}

/// `Set-Cookie` value that blanks the session and expires it immediately.
pub fn cleared_session_cookie(cfg: &CookieConfig) -> anyhow::Result<HeaderValue> {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .path("/")
        .build()
        .to_string();
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Non-empty session token from the request's `Cookie` headers.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
        .map(|c| c.value().to_string())
}
