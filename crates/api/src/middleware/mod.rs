//! Request middleware.
//!
//! - [`auth::require_session`] -- the session-cookie gate for protected routes.
//! - [`auth::AuthUser`] -- extractor for the caller admitted by the gate.

pub mod auth;
