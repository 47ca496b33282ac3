//! In-process [`SessionStore`] used by tests and local tooling.
//!
//! A transaction takes the table's async mutex for its whole lifetime and
//! works on a staged copy, so two validations of the same session serialize
//! the same way `SELECT ... FOR UPDATE` does in Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{NewSession, SessionId, SessionStore, SessionTx, SignedToken, StoreError, StoredSession};
use crate::types::{DbId, Timestamp};

type Rows = HashMap<SessionId, StoredSession>;

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    rows: Arc<Mutex<Rows>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a single row.
    pub async fn get(&self, id: SessionId) -> Option<StoredSession> {
        self.rows.lock().await.get(&id).cloned()
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Overwrite the expiry of a row directly, bypassing transactions.
    pub async fn set_expiry(&self, id: SessionId, expires_at: Timestamp) {
        if let Some(row) = self.rows.lock().await.get_mut(&id) {
            row.expires_at = expires_at;
        }
    }

    /// Make every subsequent commit fail with a backend error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    type Tx = InMemoryTx;

    async fn upsert(&self, session: &NewSession) -> Result<SessionId, StoreError> {
        let mut rows = self.rows.lock().await;

        if let Some(existing) = rows.values_mut().find(|r| r.user_id == session.user_id) {
            existing.token = session.token.clone();
            existing.expires_at = session.expires_at;
            existing.user_agent = session.user_agent.clone();
            return Ok(existing.id);
        }

        let id = SessionId::new(Uuid::new_v4());
        rows.insert(
            id,
            StoredSession {
                id,
                user_id: session.user_id,
                token: session.token.clone(),
                expires_at: session.expires_at,
                user_agent: session.user_agent.clone(),
            },
        );
        Ok(id)
    }

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = Arc::clone(&self.rows).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTx {
            guard,
            staged,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        })
    }

    async fn delete(&self, id: SessionId) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }

    async fn delete_for_user(&self, user_id: DbId) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, r| r.user_id != user_id);
        Ok(rows.len() < before)
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<Rows>,
    staged: Rows,
    fail_commit: bool,
}

#[async_trait]
impl SessionTx for InMemoryTx {
    async fn lookup(&mut self, id: SessionId) -> Result<StoredSession, StoreError> {
        self.staged.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn replace(
        &mut self,
        id: SessionId,
        token: &SignedToken,
        expires_at: Timestamp,
    ) -> Result<(), StoreError> {
        let row = self.staged.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        row.token = token.clone();
        row.expires_at = expires_at;
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Backend("commit rejected".into()));
        }
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn new_session(user_id: DbId, token: &str) -> NewSession {
        NewSession {
            user_id,
            token: SignedToken::new(token),
            expires_at: Utc::now() + Duration::minutes(15),
            user_agent: Some("test-agent".into()),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_user() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();

        let first = store.upsert(&new_session(user, "first")).await.unwrap();
        let second = store.upsert(&new_session(user, "second")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(first).await.unwrap().token.expose(), "second");
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemorySessionStore::new();
        let id = store
            .upsert(&new_session(Uuid::new_v4(), "original"))
            .await
            .unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.replace(id, &SignedToken::new("staged"), Utc::now())
                .await
                .unwrap();
        }

        assert_eq!(store.get(id).await.unwrap().token.expose(), "original");
    }

    #[tokio::test]
    async fn committed_replace_is_visible() {
        let store = InMemorySessionStore::new();
        let id = store
            .upsert(&new_session(Uuid::new_v4(), "original"))
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.replace(id, &SignedToken::new("renewed"), Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get(id).await.unwrap().token.expose(), "renewed");
    }

    #[tokio::test]
    async fn lookup_of_unknown_id_is_not_found() {
        let store = InMemorySessionStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = SessionId::new(Uuid::new_v4());
        assert_matches!(tx.lookup(id).await, Err(StoreError::NotFound(missing)) if missing == id);
    }

    #[tokio::test]
    async fn delete_for_user_removes_row() {
        let store = InMemorySessionStore::new();
        let user = Uuid::new_v4();
        store.upsert(&new_session(user, "t")).await.unwrap();

        assert!(store.delete_for_user(user).await.unwrap());
        assert!(!store.delete_for_user(user).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_by_id_leaves_other_users_alone() {
        let store = InMemorySessionStore::new();
        let doomed = store.upsert(&new_session(Uuid::new_v4(), "a")).await.unwrap();
        let kept = store.upsert(&new_session(Uuid::new_v4(), "b")).await.unwrap();

        assert!(store.delete(doomed).await.unwrap());
        assert!(!store.delete(doomed).await.unwrap());
        assert!(store.get(kept).await.is_some());
        assert_eq!(store.len().await, 1);
    }
}
