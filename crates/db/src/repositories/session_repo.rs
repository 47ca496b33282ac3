//! Repository for the `user_sessions` table.
//!
//! [`PgSessionStore`] is the Postgres implementation of the session store
//! seam. Lookups inside a [`PgSessionTx`] take a row lock
//! (`SELECT ... FOR UPDATE`), so concurrent validations of one session id
//! queue behind each other instead of renewing from a stale read.

use async_trait::async_trait;
use fleetwise_core::session::{
    NewSession, SessionId, SessionStore, SessionTx, SignedToken, StoreError, StoredSession,
};
use fleetwise_core::types::{DbId, Timestamp};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::session::UserSession;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, token, expires_at, user_agent, created_at, updated_at";

/// Session store backed by a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    type Tx = PgSessionTx;

    async fn upsert(&self, session: &NewSession) -> Result<SessionId, StoreError> {
        let (id,): (DbId,) = sqlx::query_as(
            "INSERT INTO user_sessions (token, user_id, expires_at, user_agent)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ON CONSTRAINT uq_user_sessions_user_id
             DO UPDATE SET
                token = EXCLUDED.token,
                expires_at = EXCLUDED.expires_at,
                user_agent = EXCLUDED.user_agent
             RETURNING id",
        )
        .bind(session.token.expose())
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(&session.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        Ok(SessionId::new(id))
    }

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(PgSessionTx { tx })
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: DbId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected() > 0)
    }
}

/// An open session-store transaction. Rolls back on drop unless committed.
pub struct PgSessionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SessionTx for PgSessionTx {
    async fn lookup(&mut self, id: SessionId) -> Result<StoredSession, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, UserSession>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(classify)?
            .map(StoredSession::from)
            .ok_or(StoreError::NotFound(id))
    }

    async fn replace(
        &mut self,
        id: SessionId,
        token: &SignedToken,
        expires_at: Timestamp,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE user_sessions SET token = $2, expires_at = $3 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(token.expose())
                .bind(expires_at)
                .execute(&mut *self.tx)
                .await
                .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(classify)
    }
}

/// Map a sqlx error onto the store taxonomy.
///
/// Pool exhaustion is the only timeout sqlx reports on its own; call-level
/// deadlines are applied by the caller.
fn classify(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        other => {
            tracing::error!(error = %other, "Session store query failed");
            StoreError::Backend(other.to_string())
        }
    }
}
