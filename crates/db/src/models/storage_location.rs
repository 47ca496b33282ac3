//! Storage location model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use fleetwise_core::types::{DbId, Timestamp};

/// A row from the `storage_locations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StorageLocation {
    pub id: DbId,
    pub location: String,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub updated_by: DbId,
    pub updated_at: Timestamp,
}

/// DTO for registering a storage location.
#[derive(Debug, Deserialize)]
pub struct CreateStorageLocation {
    pub location: String,
}
