//! Handlers for `/profile/{id}/notes`.
//!
//! Notes are private: the `{id}` path segment must be the signed-in user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use fleetwise_core::error::CoreError;
use fleetwise_core::types::DbId;
use fleetwise_db::models::note::{CreateNote, Note, NoteColumn, UpdateNote};
use fleetwise_db::repositories::NoteRepo;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PATCH /profile/{id}/notes/{note_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateNoteColumn {
    pub column: NoteColumn,
    pub value: String,
}

fn ensure_owner(auth: &AuthUser, profile_id: DbId) -> AppResult<()> {
    if auth.user_id != profile_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Notes belong to another profile".into(),
        )));
    }
    Ok(())
}

fn require_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "title must not be empty".into(),
        )));
    }
    Ok(())
}

fn note_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Note", id })
}

/// GET /api/v1/profile/{id}/notes
pub async fn list_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(profile_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Note>>>> {
    ensure_owner(&auth, profile_id)?;
    let notes = NoteRepo::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: notes }))
}

/// POST /api/v1/profile/{id}/notes
pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(profile_id): Path<DbId>,
    Json(input): Json<CreateNote>,
) -> AppResult<(StatusCode, Json<DataResponse<Note>>)> {
    ensure_owner(&auth, profile_id)?;
    require_title(&input.title)?;

    let note = NoteRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::debug!(note_id = %note.id, user_id = %auth.user_id, "Note created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: note })))
}

/// PUT /api/v1/profile/{id}/notes
pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(profile_id): Path<DbId>,
    Json(input): Json<UpdateNote>,
) -> AppResult<Json<DataResponse<Note>>> {
    ensure_owner(&auth, profile_id)?;
    require_title(&input.title)?;

    let note = NoteRepo::update(&state.pool, auth.user_id, &input)
        .await?
        .ok_or_else(|| note_not_found(input.id))?;
    Ok(Json(DataResponse { data: note }))
}

/// PATCH /api/v1/profile/{id}/notes/{note_id}
pub async fn update_note_column(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((profile_id, note_id)): Path<(DbId, DbId)>,
    Json(input): Json<UpdateNoteColumn>,
) -> AppResult<Json<DataResponse<Note>>> {
    ensure_owner(&auth, profile_id)?;
    if input.column == NoteColumn::Title {
        require_title(&input.value)?;
    }

    let note = NoteRepo::update_column(&state.pool, note_id, auth.user_id, input.column, &input.value)
        .await?
        .ok_or_else(|| note_not_found(note_id))?;
    Ok(Json(DataResponse { data: note }))
}

/// DELETE /api/v1/profile/{id}/notes/{note_id}
pub async fn delete_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((profile_id, note_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    ensure_owner(&auth, profile_id)?;
    if !NoteRepo::delete(&state.pool, note_id, auth.user_id).await? {
        return Err(note_not_found(note_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
