//! Handlers for registration, sign-in, email verification, logout and
//! account removal.

use axum::extract::{Path, Query, State};
use axum::http::header::{SET_COOKIE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use fleetwise_core::error::CoreError;
use fleetwise_core::session::{SessionId, SESSION_COOKIE};
use fleetwise_core::signup::{parse_birth_date, resolve_role, MIN_USERNAME_LEN};
use fleetwise_core::types::DbId;
use fleetwise_db::models::user::{CreateUser, UserResponse};
use fleetwise_db::repositories::UserRepo;
use fleetwise_notify::EmailMessage;
use serde::Deserialize;
use validator::Validate;

use crate::auth::cookie::{cleared_cookie, read_cookie, session_cookie};
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::MessageResponse;
use crate::state::AppState;

/// Response header carrying the signed-in user's role.
pub const ROLE_HEADER: HeaderName = HeaderName::from_static("role2");

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /signup`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub username: String,
    /// Birth date as `YYYY-MM-DD`.
    #[serde(default)]
    pub birthday: String,
    pub role: Option<String>,
}

/// Request body for `POST /signin`.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for `POST /isValidEmail`.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email_address: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/signup
///
/// Register a credential and send a verification email in the background.
pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let username = input.username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        ))));
    }

    let birth_date = parse_birth_date(&input.birthday, Utc::now())?;
    let password_hash = hash_password(&input.password)?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            email: input.email.trim().to_string(),
            username: username.to_string(),
            birth_date,
            password_hash,
            role: resolve_role(input.role.as_deref()),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");
    send_verification(&state, user.id, &user.email);

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// POST /api/v1/signin
///
/// Verify credentials, open a session, and hand its id back as the `token`
/// cookie. The role is echoed in the `Role2` header.
pub async fn signin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SigninRequest>,
) -> AppResult<impl IntoResponse> {
    if input.email.trim().is_empty() || input.password.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "Email and password are required".into(),
        )));
    }

    let invalid = || {
        AppError::Core(CoreError::Unauthorized(
            "Invalid email or password".into(),
        ))
    };

    let user = UserRepo::find_by_email(&state.pool, input.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&input.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Sign-in rejected: wrong password");
        return Err(invalid());
    }

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let issued = state.sessions.issue_session(user.id, user_agent).await?;

    let cookie = session_cookie(
        issued.session_id,
        issued.expires_at,
        state.config.cookie_secure,
    )?;
    let role = HeaderValue::from_str(&user.role)
        .map_err(|e| AppError::InternalError(format!("Role is not a valid header value: {e}")))?;

    Ok((
        [(SET_COOKIE, cookie), (ROLE_HEADER, role)],
        Json(UserResponse::from(&user)),
    ))
}

/// POST /api/v1/isValidEmail
///
/// `true` when no credential is registered under the email yet.
pub async fn is_valid_email(
    State(state): State<AppState>,
    Json(input): Json<EmailQuery>,
) -> AppResult<Json<bool>> {
    let email = input.email_address.trim();
    if email.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "email_address is required".into(),
        )));
    }

    let taken = UserRepo::email_exists(&state.pool, email).await?;
    Ok(Json(!taken))
}

/// GET /api/v1/verify?token=...
///
/// Accept a verification token from the email link and mark its subject verified.
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> AppResult<Json<MessageResponse>> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("token query parameter is required".into()))?;

    let issuer = state.sessions.issuer();
    let rejected = || AppError::BadRequest("Invalid or expired verification token".into());

    if !issuer.validate_token(&token).map_err(|_| rejected())? {
        return Err(rejected());
    }
    let claims = issuer.parse_token(&token).map_err(|_| rejected())?;

    if UserRepo::find_by_id(&state.pool, claims.sub).await?.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: claims.sub,
        }));
    }

    if UserRepo::mark_verified(&state.pool, claims.sub).await? {
        tracing::info!(user_id = %claims.sub, "Email address verified");
    }

    Ok(Json(MessageResponse {
        message: "Verified. Return to application to sign in.",
    }))
}

/// GET /api/v1/logout
///
/// Always clears the cookie. If it named a live session row, that row is removed.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    if let Some(session_id) =
        read_cookie(&headers, SESSION_COOKIE).and_then(|raw| raw.parse::<SessionId>().ok())
    {
        match state.sessions.revoke(session_id).await {
            Ok(true) => tracing::info!(%session_id, "Signed out"),
            Ok(false) => {}
            Err(e) => tracing::warn!(%session_id, error = %e, "Failed to revoke session on logout"),
        }
    }

    let cookie = cleared_cookie(Utc::now(), state.config.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Signed out",
        }),
    ))
}

/// POST /api/v1/reset
///
/// Resend the verification email to the signed-in user if still unverified.
pub async fn resend_verification(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<MessageResponse>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }))?;

    if user.is_verified {
        return Err(AppError::Core(CoreError::Validation(
            "User is already verified".into(),
        )));
    }

    send_verification(&state, user.id, &user.email);

    Ok(Json(MessageResponse {
        message: "Verification email requested",
    }))
}

/// DELETE /api/v1/profile/{id}
///
/// Remove the caller's own account. The session row, notes and locations the
/// user created go with it, and the cookie is cleared.
pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    if auth.user_id != id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the account owner can remove it".into(),
        )));
    }

    if !UserRepo::delete(&state.pool, id).await? {
        return Err(AppError::Core(CoreError::NotFound { entity: "User", id }));
    }
    tracing::info!(user_id = %id, session_id = %auth.session_id, "Account removed");

    let cookie = cleared_cookie(Utc::now(), state.config.cookie_secure)?;
    Ok((
        [(SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Account removed",
        }),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Mint a verification token and hand the email to the background sender.
///
/// Never fails the request: a disabled notifier or a signing failure is logged.
fn send_verification(state: &AppState, user_id: DbId, email: &str) {
    let Some(notifier) = &state.notifier else {
        tracing::debug!(%user_id, "Email service disabled; skipping verification email");
        return;
    };

    let issuer = state.sessions.issuer();
    match issuer.issue_token(user_id, issuer.ttl()) {
        Ok(token) => {
            let message =
                EmailMessage::verification(email, &notifier.config().app_url, token.expose());
            notifier.spawn(message);
        }
        Err(e) => tracing::warn!(%user_id, error = %e, "Failed to mint verification token"),
    }
}
