pub mod health;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::handlers::{auth, locations, notes};
use crate::middleware::auth::require_session;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /signup                                  register (public)
/// /signin                                  sign in, sets `token` cookie (public)
/// /isValidEmail                            email availability (public)
/// /verify?token=                           confirm email address (public)
/// /logout                                  clear cookie, end session (public)
///
/// /reset                                   resend verification email (session)
/// /locations                               list, find-or-create (session)
/// /profile/{id}                            remove own account (session)
/// /profile/{id}/notes                      list, create, update (session)
/// /profile/{id}/notes/{note_id}            update one column, delete (session)
/// ```
pub fn api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/isValidEmail", post(auth::is_valid_email))
        .route("/verify", get(auth::verify))
        .route("/logout", get(auth::logout));

    let gated = Router::new()
        .route("/reset", post(auth::resend_verification))
        .route(
            "/locations",
            get(locations::list_locations).post(locations::create_location),
        )
        .route("/profile/{id}", delete(auth::delete_account))
        .route(
            "/profile/{id}/notes",
            get(notes::list_notes)
                .post(notes::create_note)
                .put(notes::update_note),
        )
        .route(
            "/profile/{id}/notes/{note_id}",
            patch(notes::update_note_column).delete(notes::delete_note),
        )
        .route_layer(from_fn_with_state(state, require_session));

    public.merge(gated)
}
