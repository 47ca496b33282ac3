//! Repository for the `notes` table.

use sqlx::PgPool;
use fleetwise_core::types::DbId;

use crate::models::note::{CreateNote, Note, NoteColumn, UpdateNote, DEFAULT_NOTE_STATUS};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, title, description, color, status, completion_date, \
                        created_by, created_at, updated_by, updated_at";

/// Provides CRUD operations for notes. Every query is scoped to the owner.
pub struct NoteRepo;

impl NoteRepo {
    /// List a user's notes, most recently updated first.
    pub async fn list_for_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Note>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notes WHERE created_by = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a new note owned by `user_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateNote,
    ) -> Result<Note, sqlx::Error> {
        let query = format!(
            "INSERT INTO notes (title, description, color, status, completion_date, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.color)
            .bind(input.status.as_deref().unwrap_or(DEFAULT_NOTE_STATUS))
            .bind(input.completion_date)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    /// Replace the editable fields of a note owned by `user_id`.
    ///
    /// Returns `None` if no such note exists for that owner.
    pub async fn update(
        pool: &PgPool,
        user_id: DbId,
        input: &UpdateNote,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET
                title = $3,
                description = $4,
                color = $5,
                status = $6,
                completion_date = $7,
                updated_by = $2
             WHERE id = $1 AND created_by = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(input.id)
            .bind(user_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.color)
            .bind(&input.status)
            .bind(input.completion_date)
            .fetch_optional(pool)
            .await
    }

    /// Update a single allow-listed column of a note owned by `user_id`.
    pub async fn update_column(
        pool: &PgPool,
        id: DbId,
        user_id: DbId,
        column: NoteColumn,
        value: &str,
    ) -> Result<Option<Note>, sqlx::Error> {
        let query = format!(
            "UPDATE notes SET {col} = $3, updated_by = $2
             WHERE id = $1 AND created_by = $2
             RETURNING {COLUMNS}",
            col = column.as_sql()
        );
        sqlx::query_as::<_, Note>(&query)
            .bind(id)
            .bind(user_id)
            .bind(value)
            .fetch_optional(pool)
            .await
    }

    /// Delete a note owned by `user_id`. Returns `true` if the row existed.
    pub async fn delete(pool: &PgPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
