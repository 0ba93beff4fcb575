//! A+ Studio Storage Layer
//!
//! Plain-file persistence for workflow sessions:
//! - `<session_dir>/<session_id>.json` holds one metadata document per session
//! - `<session_dir>/<session_id>/` holds the binary artifacts of that session
//!
//! This crate deals in bytes only. Encoding sessions is the caller's job.

mod blobs;
mod error;
mod session_files;

pub use blobs::{BlobStore, StoredBlob};
pub use error::StorageError;
pub use session_files::SessionFiles;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Reject names that could escape the session directory.
///
/// Session ids and module tokens end up as path components, so only
/// ASCII alphanumerics, `-` and `_` are allowed.
pub(crate) fn validate_component(kind: &'static str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            kind,
            value: value.to_string(),
        })
    }
}
