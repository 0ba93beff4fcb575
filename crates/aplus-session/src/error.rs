//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session capacity exceeded: {max} sessions")]
    CapacityExceeded { max: usize },

    #[error("A session needs at least one selected module")]
    EmptyModuleSelection,

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] aplus_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot decode session document: {0}")]
    Decode(String),
}
