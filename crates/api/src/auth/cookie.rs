//! `Set-Cookie` rendering and `Cookie` header parsing for the session cookie.

use axum::http::header::COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use fleetwise_core::session::{SessionId, SESSION_COOKIE};
use fleetwise_core::types::Timestamp;

use crate::error::AppError;

/// RFC 7231 IMF-fixdate, the format browsers expect in `Expires`.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Cookie carrying `session_id` that the browser drops at `expires_at`.
pub fn session_cookie(
    session_id: SessionId,
    expires_at: Timestamp,
    secure: bool,
) -> Result<HeaderValue, AppError> {
    render(&session_id.to_string(), expires_at, secure)
}

/// Cookie that overwrites the session cookie with an empty value expiring at `now`.
pub fn cleared_cookie(now: Timestamp, secure: bool) -> Result<HeaderValue, AppError> {
    render("", now, secure)
}

fn render(value: &str, expires_at: Timestamp, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={value}; Path=/; Expires={}; HttpOnly",
        expires_at.format(HTTP_DATE_FORMAT)
    );
    if secure {
        cookie.push_str("; Secure; SameSite=None");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::InternalError(format!("Invalid cookie header: {e}")))
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}
