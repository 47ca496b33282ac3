//! HS256 token issuing and verification.
//!
//! Tokens are HS256-signed JWTs containing a [`Claims`] payload whose subject
//! is the owning user's id. The same issuer mints session tokens (persisted
//! server-side, never sent to clients) and email verification tokens.

use std::fmt;

use chrono::{Duration, Utc};
use fleetwise_core::session::{SignedToken, DEFAULT_TOKEN_TTL_MINS};
use fleetwise_core::types::{DbId, Timestamp};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigError;

/// Upper bound for `TOKEN_VALIDITY_TIME`: one year, in minutes.
pub const MAX_TOKEN_TTL_MINS: i64 = 60 * 24 * 365;

/// JWT claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The signing operation itself failed.
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Malformed input or a signature that does not verify.
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    /// `now + ttl` does not fit in a timestamp.
    #[error("token lifetime out of range")]
    Lifetime,
}

/// Secret and lifetime used to construct a [`TokenIssuer`].
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Token lifetime in minutes (default: 15).
    pub ttl_mins: i64,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl_mins", &self.ttl_mins)
            .finish()
    }
}

impl TokenConfig {
    /// Load token configuration from environment variables.
    ///
    /// | Env Var               | Required | Default |
    /// |-----------------------|----------|---------|
    /// | `TOKEN_SECRET_KEY`    | **yes**  | --      |
    /// | `TOKEN_VALIDITY_TIME` | no       | `15`    |
    ///
    /// `TOKEN_VALIDITY_TIME` must lie in `1..=MAX_TOKEN_TTL_MINS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("TOKEN_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("TOKEN_SECRET_KEY"))?;
        if secret.trim().is_empty() {
            return Err(ConfigError::Missing("TOKEN_SECRET_KEY"));
        }

        let ttl_mins = match std::env::var("TOKEN_VALIDITY_TIME") {
            Ok(raw) => parse_ttl_mins(&raw)?,
            Err(_) => DEFAULT_TOKEN_TTL_MINS,
        };

        Ok(Self { secret, ttl_mins })
    }
}

fn parse_ttl_mins(raw: &str) -> Result<i64, ConfigError> {
    match raw.trim().parse::<i64>() {
        Ok(mins) if (1..=MAX_TOKEN_TTL_MINS).contains(&mins) => Ok(mins),
        _ => Err(ConfigError::Invalid {
            var: "TOKEN_VALIDITY_TIME",
            value: raw.to_string(),
        }),
    }
}

/// Signs and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::minutes(config.ttl_mins.clamp(1, MAX_TOKEN_TTL_MINS)),
        }
    }

    /// The configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` that expires `ttl` from now.
    pub fn issue_token(&self, subject: DbId, ttl: Duration) -> Result<SignedToken, TokenError> {
        self.issue_token_at(subject, ttl, Utc::now())
    }

    /// Sign a token for `subject` with `iat = now` and `exp = now + ttl`.
    pub fn issue_token_at(
        &self,
        subject: DbId,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<SignedToken, TokenError> {
        let claims = Claims {
            sub: subject,
            exp: self.expiry_at(ttl, now)?.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(SignedToken::new)
            .map_err(TokenError::Signing)
    }

    /// `now + ttl`, or [`TokenError::Lifetime`] when it overflows.
    pub fn expiry_at(&self, ttl: Duration, now: Timestamp) -> Result<Timestamp, TokenError> {
        now.checked_add_signed(ttl).ok_or(TokenError::Lifetime)
    }

    /// Verify the signature and decode the claims. Expiry is not judged here.
    pub fn parse_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }

    /// `Ok(false)` for a correctly signed token that has expired.
    pub fn validate_token(&self, token: &str) -> Result<bool, TokenError> {
        self.validate_token_at(token, Utc::now())
    }

    pub fn validate_token_at(&self, token: &str, now: Timestamp) -> Result<bool, TokenError> {
        let claims = self.parse_token(token)?;
        Ok(Self::is_live(&claims, now))
    }

    /// Whether `claims` are still within their `exp` at `now`.
    pub fn is_live(claims: &Claims, now: Timestamp) -> bool {
        claims.exp > now.timestamp()
    }
}
