//! Session-cookie gate for protected routes.
//!
//! [`require_session`] is mounted as a route layer on the gated router. It
//! resolves the `token` cookie through the session validator, stores the
//! resulting [`AuthUser`] in the request extensions, and re-issues the cookie
//! when validation renewed the session. Every rejection is a 401.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fleetwise_core::error::CoreError;
use fleetwise_core::session::{SessionId, SESSION_COOKIE};
use fleetwise_core::types::{DbId, Timestamp};

use crate::auth::cookie::{read_cookie, session_cookie};
use crate::auth::session::{SessionError, ValidationOutcome};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller, available to any handler behind [`require_session`].
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    /// Owner of the session.
    pub user_id: DbId,
    /// The session id carried in the cookie.
    pub session_id: SessionId,
    /// Session expiry after validation (and renewal, if any).
    pub expires_at: Timestamp,
}

fn unauthorized() -> AppError {
    AppError::Core(CoreError::Unauthorized(
        "missing or invalid session".into(),
    ))
}

/// Route layer that admits only requests carrying a valid session cookie.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(raw) = read_cookie(req.headers(), SESSION_COOKIE) else {
        tracing::debug!("Rejected request without session cookie");
        return unauthorized().into_response();
    };

    let Ok(session_id) = raw.parse::<SessionId>() else {
        tracing::debug!("Rejected request with malformed session cookie");
        return unauthorized().into_response();
    };

    let validated = match state.sessions.validate(session_id).await {
        Ok(validated) => validated,
        Err(SessionError::Timeout) => {
            tracing::warn!(%session_id, "Session validation timed out");
            return unauthorized().into_response();
        }
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "Session validation failed");
            return unauthorized().into_response();
        }
    };

    req.extensions_mut().insert(AuthUser {
        user_id: validated.user_id,
        session_id,
        expires_at: validated.expires_at,
    });

    let mut response = next.run(req).await;

    // A cookie set by the handler itself (account removal) takes precedence.
    if validated.outcome == ValidationOutcome::Renewed
        && !response.headers().contains_key(SET_COOKIE)
    {
        match session_cookie(session_id, validated.expires_at, state.config.cookie_secure) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(e) => tracing::error!(error = %e, "Failed to render renewed session cookie"),
        }
    }

    response
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().copied().ok_or_else(|| {
            tracing::error!(path = %parts.uri.path(), "AuthUser requested on an ungated route");
            unauthorized()
        })
    }
}
