//! Note model, DTOs, and the allow-list of individually updatable columns.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use fleetwise_core::types::{DbId, Timestamp};

/// A row from the `notes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Note {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub color: Option<String>,
    pub status: String,
    pub completion_date: Option<Timestamp>,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_by: DbId,
    pub updated_at: Timestamp,
}

/// DTO for creating a note.
#[derive(Debug, Deserialize)]
pub struct CreateNote {
    pub title: String,
    pub description: String,
    pub color: Option<String>,
    pub status: Option<String>,
    pub completion_date: Option<Timestamp>,
}

/// DTO for replacing the editable fields of a note.
#[derive(Debug, Deserialize)]
pub struct UpdateNote {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub color: Option<String>,
    pub status: String,
    pub completion_date: Option<Timestamp>,
}

/// Note columns that may be updated one at a time.
///
/// Deserialization rejects any other name, so client input never reaches
/// the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteColumn {
    Title,
    Description,
    Color,
    Status,
}

impl NoteColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            NoteColumn::Title => "title",
            NoteColumn::Description => "description",
            NoteColumn::Color => "color",
            NoteColumn::Status => "status",
        }
    }
}

/// Default status for notes created without one.
pub const DEFAULT_NOTE_STATUS: &str = "draft";
