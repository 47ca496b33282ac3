//! Handlers for the shared `/locations` list.

use axum::extract::State;
use axum::Json;
use fleetwise_core::error::CoreError;
use fleetwise_db::models::storage_location::{CreateStorageLocation, StorageLocation};
use fleetwise_db::repositories::StorageLocationRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/locations
pub async fn list_locations(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<StorageLocation>>>> {
    let locations = StorageLocationRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: locations }))
}

/// POST /api/v1/locations
///
/// Returns the existing row when the name is already known.
pub async fn create_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateStorageLocation>,
) -> AppResult<Json<DataResponse<StorageLocation>>> {
    let name = input.location.trim();
    if name.is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "location must not be empty".into(),
        )));
    }

    let location = StorageLocationRepo::find_or_create(&state.pool, name, auth.user_id).await?;
    Ok(Json(DataResponse { data: location }))
}
