//! Session identifiers and the session record store seam.
//!
//! A session row binds one user to one signed token and its expiry. The
//! signed token never leaves the server: callers only ever see the
//! storage-assigned [`SessionId`], which is why the two are distinct types.
//!
//! Stores are accessed through [`SessionStore`] for single-statement work
//! (upsert, delete) and through a [`SessionTx`] for the
//! lookup-then-maybe-replace sequence, which must run inside one
//! transaction so concurrent renewals of the same session serialize.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DbId, Timestamp};

/// Sessions whose remaining lifetime is at or below this many seconds are
/// transparently renewed on their next validation.
pub const RENEWAL_WINDOW_SECS: i64 = 30;

/// Default token lifetime in minutes when none is configured.
pub const DEFAULT_TOKEN_TTL_MINS: i64 = 15;

/// Name of the cookie that carries the [`SessionId`].
pub const SESSION_COOKIE: &str = "token";

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque, storage-assigned identifier of a session row.
///
/// This is the masked token handed to clients as the `token` cookie value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// ---------------------------------------------------------------------------
// SignedToken
// ---------------------------------------------------------------------------

/// A signed JWT as persisted in the session row.
///
/// Deliberately not `Serialize` and redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw token for signature verification or storage.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Input for [`SessionStore::upsert`].
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: DbId,
    pub token: SignedToken,
    pub expires_at: Timestamp,
    pub user_agent: Option<String>,
}

/// A session row as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub id: SessionId,
    pub user_id: DbId,
    pub token: SignedToken,
    pub expires_at: Timestamp,
    pub user_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Failures surfaced by a session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No session row matches the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The store did not answer within the allotted time.
    #[error("session store timed out")]
    Timeout,

    /// Any other backend failure, already rendered for logging.
    #[error("session store error: {0}")]
    Backend(String),
}

/// Persistence for session rows.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Transaction handle used for lookup-then-replace.
    type Tx: SessionTx;

    /// Insert a session for `session.user_id`, or overwrite the token,
    /// expiry and user agent of the existing one, in a single statement.
    async fn upsert(&self, session: &NewSession) -> Result<SessionId, StoreError>;

    /// Open a transaction. Dropping it without [`SessionTx::commit`] rolls
    /// back every change made through it.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Remove the session row with this id, whatever its expiry, in a single
    /// statement. Returns `true` if a row existed.
    async fn delete(&self, id: SessionId) -> Result<bool, StoreError>;

    /// Remove the session owned by `user_id`. Returns `true` if a row existed.
    async fn delete_for_user(&self, user_id: DbId) -> Result<bool, StoreError>;
}

/// Operations available inside a session store transaction.
#[async_trait]
pub trait SessionTx: Send {
    /// Load a session row, holding it locked until the transaction ends.
    async fn lookup(&mut self, id: SessionId) -> Result<StoredSession, StoreError>;

    /// Overwrite token and expiry of an existing row in place.
    async fn replace(
        &mut self,
        id: SessionId,
        token: &SignedToken,
        expires_at: Timestamp,
    ) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
