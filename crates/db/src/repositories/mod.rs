//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Sessions are the exception:
//! [`PgSessionStore`] owns its pool because it implements the
//! `SessionStore` seam from `fleetwise_core`.

pub mod note_repo;
pub mod session_repo;
pub mod storage_location_repo;
pub mod user_repo;

pub use note_repo::NoteRepo;
pub use session_repo::{PgSessionStore, PgSessionTx};
pub use storage_location_repo::StorageLocationRepo;
pub use user_repo::UserRepo;
