use std::sync::Arc;
use std::time::Duration;

use fleetwise_db::repositories::PgSessionStore;
use fleetwise_notify::EmailNotifier;

use crate::auth::jwt::TokenIssuer;
use crate::auth::session::SessionService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: fleetwise_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session issuing and validation over the Postgres session store.
    pub sessions: Arc<SessionService<PgSessionStore>>,
    /// Outbound email; `None` when the email service is disabled.
    pub notifier: Option<Arc<EmailNotifier>>,
}

impl AppState {
    pub fn new(pool: fleetwise_db::DbPool, config: ServerConfig) -> Self {
        let sessions = SessionService::new(
            PgSessionStore::new(pool.clone()),
            TokenIssuer::new(&config.token),
            Duration::from_millis(config.store_timeout_ms),
        );
        let notifier = config
            .email
            .clone()
            .map(|email| Arc::new(EmailNotifier::new(email)));

        Self {
            pool,
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            notifier,
        }
    }
}
