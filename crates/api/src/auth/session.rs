//! Session issuing, validation with sliding renewal, and logout.
//!
//! A session is valid while its stored expiry is in the future and its stored
//! token verifies and has not passed its own `exp`. When the remaining
//! lifetime drops to [`RENEWAL_WINDOW_SECS`] or less, validation mints a fresh
//! token with the full configured lifetime and writes it back in the same
//! transaction, keeping the same [`SessionId`].

use std::future::Future;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use fleetwise_core::session::{
    NewSession, SessionId, SessionStore, SessionTx, StoreError, RENEWAL_WINDOW_SECS,
};
use fleetwise_core::types::{DbId, Timestamp};

use crate::auth::jwt::{TokenError, TokenIssuer};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The caller is not (or no longer) authenticated.
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Signing(TokenError),

    /// The store did not answer in time. Retryable.
    #[error("session store timed out")]
    Timeout,

    #[error("session store failure: {0}")]
    Store(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::NotFound(id),
            StoreError::Timeout => SessionError::Timeout,
            StoreError::Backend(msg) => SessionError::Store(msg),
        }
    }
}

/// Result of a successful [`SessionService::issue_session`].
#[derive(Debug, Clone, Copy)]
pub struct IssuedSession {
    pub session_id: SessionId,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The session was valid and left untouched.
    Active,
    /// The session was inside the renewal window and now carries a new token.
    Renewed,
}

/// Result of a successful [`SessionService::validate`].
#[derive(Debug, Clone, Copy)]
pub struct Validated {
    pub user_id: DbId,
    pub expires_at: Timestamp,
    pub outcome: ValidationOutcome,
}

/// Coordinates the token issuer and a session store.
pub struct SessionService<S: SessionStore> {
    store: S,
    issuer: TokenIssuer,
    store_timeout: StdDuration,
}

impl<S: SessionStore> SessionService<S> {
    pub fn new(store: S, issuer: TokenIssuer, store_timeout: StdDuration) -> Self {
        Self {
            store,
            issuer,
            store_timeout,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Mint a token for `user_id` and upsert the user's single session row.
    pub async fn issue_session(
        &self,
        user_id: DbId,
        user_agent: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        self.issue_session_at(user_id, user_agent, Utc::now()).await
    }

    pub async fn issue_session_at(
        &self,
        user_id: DbId,
        user_agent: Option<String>,
        now: Timestamp,
    ) -> Result<IssuedSession, SessionError> {
        let ttl = self.issuer.ttl();
        let expires_at = self
            .issuer
            .expiry_at(ttl, now)
            .map_err(SessionError::Signing)?;
        let token = self
            .issuer
            .issue_token_at(user_id, ttl, now)
            .map_err(SessionError::Signing)?;

        let session = NewSession {
            user_id,
            token,
            expires_at,
            user_agent,
        };
        let session_id = self.guarded(self.store.upsert(&session)).await?;

        tracing::info!(%user_id, %session_id, %expires_at, "Session issued");
        Ok(IssuedSession {
            session_id,
            expires_at,
        })
    }

    /// Check a session id and renew it when it is about to expire.
    pub async fn validate(&self, session_id: SessionId) -> Result<Validated, SessionError> {
        self.validate_at(session_id, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        session_id: SessionId,
        now: Timestamp,
    ) -> Result<Validated, SessionError> {
        let mut tx = self.guarded(self.store.begin()).await?;

        let row = match self.guarded(tx.lookup(session_id)).await {
            Ok(row) => row,
            Err(StoreError::NotFound(_)) => {
                return Err(SessionError::Authentication(
                    "missing or invalid session".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let claims = self.issuer.parse_token(row.token.expose()).map_err(|e| {
            tracing::debug!(%session_id, error = %e, "Stored session token failed verification");
            SessionError::Authentication("invalid session token".into())
        })?;
        if claims.sub != row.user_id {
            return Err(SessionError::Authentication(
                "session token subject mismatch".into(),
            ));
        }
        if !TokenIssuer::is_live(&claims, now) {
            return Err(SessionError::Authentication("session token expired".into()));
        }

        let remaining = row.expires_at - now;
        if remaining <= Duration::zero() {
            return Err(SessionError::Authentication("session expired".into()));
        }

        let (outcome, expires_at) = if remaining <= Duration::seconds(RENEWAL_WINDOW_SECS) {
            let ttl = self.issuer.ttl();
            let expires_at = self
                .issuer
                .expiry_at(ttl, now)
                .map_err(SessionError::Signing)?;
            let token = self
                .issuer
                .issue_token_at(row.user_id, ttl, now)
                .map_err(SessionError::Signing)?;

            match self.guarded(tx.replace(session_id, &token, expires_at)).await {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(SessionError::Authentication(
                        "missing or invalid session".into(),
                    ))
                }
                Err(e) => return Err(e.into()),
            }
            (ValidationOutcome::Renewed, expires_at)
        } else {
            (ValidationOutcome::Active, row.expires_at)
        };

        if let Err(e) = self.guarded(tx.commit()).await {
            tracing::warn!(%session_id, error = %e, "Session commit failed");
            return Err(SessionError::Authentication(
                "session could not be confirmed".into(),
            ));
        }

        if outcome == ValidationOutcome::Renewed {
            tracing::info!(%session_id, user_id = %row.user_id, %expires_at, "Session renewed");
        }

        Ok(Validated {
            user_id: row.user_id,
            expires_at,
            outcome,
        })
    }

    /// Remove the session owned by `user_id`. Returns `true` if one existed.
    pub async fn end_session(&self, user_id: DbId) -> Result<bool, SessionError> {
        let removed = self.guarded(self.store.delete_for_user(user_id)).await?;
        if removed {
            tracing::info!(%user_id, "Session ended");
        }
        Ok(removed)
    }

    /// Remove the session identified by `session_id` regardless of its expiry.
    ///
    /// Returns `false` when no such session exists.
    pub async fn revoke(&self, session_id: SessionId) -> Result<bool, SessionError> {
        let removed = self.guarded(self.store.delete(session_id)).await?;
        if removed {
            tracing::info!(%session_id, "Session revoked");
        }
        Ok(removed)
    }

    /// Bound a store call by the configured store timeout.
    async fn guarded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenConfig;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use fleetwise_core::session::memory::InMemorySessionStore;
    use fleetwise_core::session::SignedToken;
    use uuid::Uuid;

    const SECRET: &str = "session-test-secret";

    fn service() -> SessionService<InMemorySessionStore> {
        let issuer = TokenIssuer::new(&TokenConfig {
            secret: SECRET.to_string(),
            ttl_mins: 15,
        });
        SessionService::new(
            InMemorySessionStore::new(),
            issuer,
            StdDuration::from_secs(5),
        )
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// Issue a session at `t0` and move its stored expiry to `t0 + ttl`.
    async fn session_expiring_in(
        svc: &SessionService<InMemorySessionStore>,
        ttl: Duration,
    ) -> (DbId, SessionId) {
        let user = Uuid::new_v4();
        let issued = svc.issue_session_at(user, None, t0()).await.unwrap();
        svc.store()
            .set_expiry(issued.session_id, t0() + ttl)
            .await;
        (user, issued.session_id)
    }

    #[tokio::test]
    async fn issued_session_expires_after_configured_ttl() {
        let svc = service();
        let user = Uuid::new_v4();
        let issued = svc
            .issue_session_at(user, Some("curl/8".into()), t0())
            .await
            .unwrap();

        assert_eq!(issued.expires_at, t0() + Duration::minutes(15));
        let row = svc.store().get(issued.session_id).await.unwrap();
        assert_eq!(row.user_id, user);
        assert_eq!(row.user_agent.as_deref(), Some("curl/8"));
    }

    #[tokio::test]
    async fn signing_in_twice_reuses_the_session_row() {
        let svc = service();
        let user = Uuid::new_v4();
        let first = svc.issue_session_at(user, None, t0()).await.unwrap();
        let second = svc
            .issue_session_at(user, None, t0() + Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(svc.store().len().await, 1);
    }

    #[tokio::test]
    async fn inside_renewal_window_renews() {
        let svc = service();
        let (user, id) = session_expiring_in(&svc, Duration::seconds(29)).await;
        let before = svc.store().get(id).await.unwrap().token;

        let validated = svc.validate_at(id, t0()).await.unwrap();

        assert_eq!(validated.user_id, user);
        assert_eq!(validated.outcome, ValidationOutcome::Renewed);
        assert_eq!(validated.expires_at, t0() + Duration::minutes(15));
        let row = svc.store().get(id).await.unwrap();
        assert_eq!(row.expires_at, t0() + Duration::minutes(15));
        assert_ne!(row.token, before);
    }

    #[tokio::test]
    async fn exactly_at_window_boundary_renews() {
        let svc = service();
        let (_, id) = session_expiring_in(&svc, Duration::seconds(30)).await;
        let validated = svc.validate_at(id, t0()).await.unwrap();
        assert_eq!(validated.outcome, ValidationOutcome::Renewed);
    }

    #[tokio::test]
    async fn outside_renewal_window_does_not_mutate() {
        let svc = service();
        let (user, id) = session_expiring_in(&svc, Duration::seconds(31)).await;
        let before = svc.store().get(id).await.unwrap();

        let validated = svc.validate_at(id, t0()).await.unwrap();

        assert_eq!(validated.user_id, user);
        assert_eq!(validated.outcome, ValidationOutcome::Active);
        let after = svc.store().get(id).await.unwrap();
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let svc = service();
        for ttl in [Duration::zero(), Duration::seconds(-1)] {
            let (_, id) = session_expiring_in(&svc, ttl).await;
            let before = svc.store().get(id).await.unwrap();

            assert_matches!(
                svc.validate_at(id, t0()).await,
                Err(SessionError::Authentication(_))
            );
            assert_eq!(svc.store().get(id).await.unwrap().token, before.token);
        }
    }

    #[tokio::test]
    async fn unknown_session_is_an_authentication_failure() {
        let svc = service();
        let missing = SessionId::new(Uuid::new_v4());
        assert_matches!(
            svc.validate_at(missing, t0()).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn fifteen_minute_session_lifecycle() {
        let svc = service();
        let user = Uuid::new_v4();
        let id = svc.issue_session_at(user, None, t0()).await.unwrap().session_id;

        // Ten minutes in: untouched.
        let v = svc.validate_at(id, t0() + Duration::minutes(10)).await.unwrap();
        assert_eq!(v.outcome, ValidationOutcome::Active);
        assert_eq!(v.expires_at, t0() + Duration::minutes(15));

        // Twenty seconds before expiry: renewed to a fresh 15 minutes.
        let near_end = t0() + Duration::minutes(15) - Duration::seconds(20);
        let v = svc.validate_at(id, near_end).await.unwrap();
        assert_eq!(v.outcome, ValidationOutcome::Renewed);
        assert_eq!(v.expires_at, near_end + Duration::minutes(15));

        // Past the original expiry but inside the renewed one.
        let v = svc.validate_at(id, t0() + Duration::minutes(16)).await.unwrap();
        assert_eq!(v.outcome, ValidationOutcome::Active);

        // Past the renewed expiry.
        let gone = near_end + Duration::minutes(15) + Duration::seconds(1);
        assert_matches!(
            svc.validate_at(id, gone).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn commit_failure_fails_closed() {
        let svc = service();
        let (_, id) = session_expiring_in(&svc, Duration::seconds(10)).await;
        let before = svc.store().get(id).await.unwrap();

        svc.store().fail_commits(true);
        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );

        let after = svc.store().get(id).await.unwrap();
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let svc = service();
        let (user, id) = session_expiring_in(&svc, Duration::minutes(10)).await;

        let foreign = TokenIssuer::new(&TokenConfig {
            secret: "someone-else".to_string(),
            ttl_mins: 15,
        });
        let forged = foreign.issue_token_at(user, Duration::minutes(15), t0()).unwrap();
        let mut tx = svc.store().begin().await.unwrap();
        tx.replace(id, &forged, t0() + Duration::minutes(10)).await.unwrap();
        tx.commit().await.unwrap();

        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn token_for_another_subject_is_rejected() {
        let svc = service();
        let (_, id) = session_expiring_in(&svc, Duration::minutes(10)).await;

        let stranger = svc
            .issuer()
            .issue_token_at(Uuid::new_v4(), Duration::minutes(15), t0())
            .unwrap();
        let mut tx = svc.store().begin().await.unwrap();
        tx.replace(id, &stranger, t0() + Duration::minutes(10)).await.unwrap();
        tx.commit().await.unwrap();

        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn garbage_stored_token_is_rejected() {
        let svc = service();
        let (_, id) = session_expiring_in(&svc, Duration::minutes(10)).await;

        let mut tx = svc.store().begin().await.unwrap();
        tx.replace(id, &SignedToken::new("garbage"), t0() + Duration::minutes(10))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn expired_stored_token_is_rejected_even_if_row_is_live() {
        let svc = service();
        let user = Uuid::new_v4();
        // Token minted twenty minutes ago with a fifteen minute lifetime.
        let id = svc
            .issue_session_at(user, None, t0() - Duration::minutes(20))
            .await
            .unwrap()
            .session_id;
        svc.store().set_expiry(id, t0() + Duration::minutes(10)).await;
        let before = svc.store().get(id).await.unwrap();

        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );
        let after = svc.store().get(id).await.unwrap();
        assert_eq!(after.token, before.token);
        assert_eq!(after.expires_at, before.expires_at);
    }

    #[tokio::test]
    async fn concurrent_validations_renew_once() {
        let svc = service();
        let (user, id) = session_expiring_in(&svc, Duration::seconds(10)).await;

        let (a, b) = tokio::join!(svc.validate_at(id, t0()), svc.validate_at(id, t0()));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.user_id, user);
        assert_eq!(b.user_id, user);
        let renewed = [a.outcome, b.outcome]
            .iter()
            .filter(|o| **o == ValidationOutcome::Renewed)
            .count();
        assert_eq!(renewed, 1, "the second validation must see the renewed row");
        assert_eq!(a.expires_at, t0() + Duration::minutes(15));
        assert_eq!(b.expires_at, t0() + Duration::minutes(15));

        assert_eq!(svc.store().len().await, 1);
        let row = svc.store().get(id).await.unwrap();
        assert_eq!(row.expires_at, t0() + Duration::minutes(15));
    }

    #[tokio::test]
    async fn oversized_ttl_is_a_signing_error() {
        let svc = service();
        let end_of_time = chrono::DateTime::<Utc>::MAX_UTC;
        assert_matches!(
            svc.issue_session_at(Uuid::new_v4(), None, end_of_time).await,
            Err(SessionError::Signing(TokenError::Lifetime))
        );
        assert!(svc.store().is_empty().await);
    }

    #[tokio::test]
    async fn end_session_removes_the_row() {
        let svc = service();
        let user = Uuid::new_v4();
        let id = svc.issue_session_at(user, None, t0()).await.unwrap().session_id;

        assert!(svc.end_session(user).await.unwrap());
        assert!(!svc.end_session(user).await.unwrap());
        assert_matches!(
            svc.validate_at(id, t0()).await,
            Err(SessionError::Authentication(_))
        );
    }

    #[tokio::test]
    async fn revoke_removes_even_an_expired_session() {
        let svc = service();
        let (user, id) = session_expiring_in(&svc, Duration::seconds(-60)).await;

        assert!(svc.revoke(id).await.unwrap());
        assert!(svc.store().is_empty().await);
        assert!(!svc.revoke(id).await.unwrap());
        assert!(!svc.end_session(user).await.unwrap());
    }

    #[tokio::test]
    async fn revoking_a_stale_id_spares_the_new_session() {
        let svc = service();
        let user = Uuid::new_v4();
        let stale = svc.issue_session_at(user, None, t0()).await.unwrap().session_id;
        assert!(svc.revoke(stale).await.unwrap());

        let fresh = svc.issue_session_at(user, None, t0()).await.unwrap().session_id;
        assert_ne!(fresh, stale);

        assert!(!svc.revoke(stale).await.unwrap());
        assert_eq!(svc.validate_at(fresh, t0()).await.unwrap().user_id, user);
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let svc = SessionService::new(
            InMemorySessionStore::new(),
            TokenIssuer::new(&TokenConfig {
                secret: SECRET.to_string(),
                ttl_mins: 15,
            }),
            StdDuration::from_millis(20),
        );
        let id = svc
            .issue_session_at(Uuid::new_v4(), None, t0())
            .await
            .unwrap()
            .session_id;

        // Hold the table lock so `begin` cannot proceed.
        let _held = svc.store().begin().await.unwrap();
        assert_matches!(svc.validate_at(id, t0()).await, Err(SessionError::Timeout));
    }
}
