//! User session row.

use fleetwise_core::session::{SessionId, SignedToken, StoredSession};
use fleetwise_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A session row from the `user_sessions` table.
///
/// At most one row exists per user (`uq_user_sessions_user_id`).
#[derive(Debug, Clone, FromRow)]
pub struct UserSession {
    pub id: DbId,
    pub user_id: DbId,
    pub token: String,
    pub expires_at: Timestamp,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<UserSession> for StoredSession {
    fn from(row: UserSession) -> Self {
        Self {
            id: SessionId::new(row.id),
            user_id: row.user_id,
            token: SignedToken::new(row.token),
            expires_at: row.expires_at,
            user_agent: row.user_agent,
        }
    }
}
