//! Repository for the `storage_locations` table.

use sqlx::PgPool;
use fleetwise_core::types::DbId;

use crate::models::storage_location::StorageLocation;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, location, created_by, created_at, updated_by, updated_at";

/// Provides read and find-or-create operations for storage locations.
pub struct StorageLocationRepo;

impl StorageLocationRepo {
    /// List all storage locations, least recently updated first.
    pub async fn list(pool: &PgPool) -> Result<Vec<StorageLocation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM storage_locations ORDER BY updated_at");
        sqlx::query_as::<_, StorageLocation>(&query)
            .fetch_all(pool)
            .await
    }

    /// Return the existing location with this name, or insert a new one.
    ///
    /// Locations are shared by name, so a second caller registering the same
    /// place gets the first caller's row back, untouched.
    pub async fn find_or_create(
        pool: &PgPool,
        location: &str,
        user_id: DbId,
    ) -> Result<StorageLocation, sqlx::Error> {
        // The outer SELECT runs on the statement snapshot, so it only sees a
        // row that existed before this insert; exactly one branch yields.
        let query = format!(
            "WITH inserted AS (
                INSERT INTO storage_locations (location, created_by, updated_by)
                VALUES ($1, $2, $2)
                ON CONFLICT ON CONSTRAINT uq_storage_locations_location DO NOTHING
                RETURNING {COLUMNS}
             )
             SELECT {COLUMNS} FROM inserted
             UNION ALL
             SELECT {COLUMNS} FROM storage_locations WHERE location = $1
             LIMIT 1"
        );
        sqlx::query_as::<_, StorageLocation>(&query)
            .bind(location)
            .bind(user_id)
            .fetch_one(pool)
            .await
    }
}
