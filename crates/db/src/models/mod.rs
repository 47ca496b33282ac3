//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Update DTOs where the resource supports them

pub mod note;
pub mod session;
pub mod storage_location;
pub mod user;
