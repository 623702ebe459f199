//! CRUD over agents, targets, and operator users — spec component D.
//!
//! IDs are server-assigned UUIDs on create; unique-name constraints live in
//! the schema (`disttrace-store::schema`) and surface here as
//! [`RegistryError::NameTaken`]; validation runs before every write.

#![forbid(unsafe_code)]

pub mod agents;
pub mod targets;
pub mod users;

use thiserror::Error;
use uuid::Uuid;

use disttrace_store::StoreError;

pub use agents::AgentRegistry;
pub use targets::TargetRegistry;
pub use users::UserRegistry;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("name already in use")]
    NameTaken,
    #[error("no such record: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Maps a raw store error to [`RegistryError::NameTaken`] when it's a unique
/// constraint violation, otherwise passes it through as
/// [`RegistryError::Store`].
pub(crate) fn map_write_error(err: StoreError) -> RegistryError {
    if let StoreError::Sqlite(rusqlite::Error::SqliteFailure(sqlite_err, _)) = &err {
        if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation {
            return RegistryError::NameTaken;
        }
    }
    RegistryError::Store(err)
}
