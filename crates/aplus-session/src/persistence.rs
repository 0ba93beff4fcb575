//! Session persistence
//!
//! Ties the codec to the filesystem layer. Writes are best-effort: a failed
//! write is logged and reported as `false`, never as an error, because the
//! in-memory session stays authoritative until the next successful write.

use chrono::{DateTime, Utc};
use std::path::Path;

use aplus_storage::{BlobStore, SessionFiles};

use crate::codec;
use crate::error::SessionError;
use crate::expiry::ExpiryResolver;
use crate::module::ModuleType;
use crate::session::{BlobRef, Session};
use crate::Result;

/// Result of the startup scan
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub sessions: Vec<Session>,
    /// Documents that were already past their TTL and got deleted
    pub expired_removed: usize,
    /// Documents that could not be read or decoded
    pub corrupt_skipped: usize,
}

/// What a destroy actually removed from disk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Destroyed {
    pub metadata_removed: bool,
    pub blob_files_removed: usize,
}

impl Destroyed {
    pub fn files_removed(&self) -> usize {
        self.blob_files_removed + usize::from(self.metadata_removed)
    }
}

#[derive(Debug, Clone)]
pub struct PersistenceLayer {
    files: SessionFiles,
    blobs: BlobStore,
}

impl PersistenceLayer {
    /// Open the session directory, creating it if it does not exist
    pub fn open(session_dir: &Path) -> Result<Self> {
        let files = SessionFiles::open(session_dir)?;
        let blobs = BlobStore::new(session_dir);

        Ok(Self { files, blobs })
    }

    /// Write the full metadata snapshot of a session
    pub fn persist(&self, session: &Session) -> bool {
        let result = codec::to_bytes(session)
            .and_then(|bytes| Ok(self.files.write(&session.session_id, &bytes)?));

        match result {
            Ok(path) => {
                tracing::trace!(
                    session_id = %session.session_id,
                    path = %path.display(),
                    "Persisted session"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %e,
                    "Failed to persist session; in-memory state kept"
                );
                false
            }
        }
    }

    pub fn write_blob(
        &self,
        session_id: &str,
        module: ModuleType,
        bytes: &[u8],
        extension: &str,
        at: DateTime<Utc>,
    ) -> Option<BlobRef> {
        match self
            .blobs
            .write(session_id, module.as_str(), bytes, extension, at.timestamp())
        {
            Ok(stored) => Some(BlobRef {
                path: stored.path,
                size_bytes: stored.size_bytes,
                sha256: stored.sha256,
            }),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    module = %module,
                    error = %e,
                    "Failed to write artifact blob"
                );
                None
            }
        }
    }

    pub fn read_blob(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        Ok(self.blobs.read_verified(&blob.path, &blob.sha256)?)
    }

    /// Remove the metadata file and blob directory of a session.
    ///
    /// Both removals are attempted even if one fails.
    pub fn destroy(&self, session_id: &str) -> Destroyed {
        let metadata_removed = self.files.remove(session_id).unwrap_or_else(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to remove session file");
            false
        });
        let blob_files_removed = self
            .blobs
            .delete_session_blobs(session_id)
            .unwrap_or_else(|e| {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to remove session blobs");
                0
            });

        Destroyed {
            metadata_removed,
            blob_files_removed,
        }
    }

    pub fn probe(&self) -> Result<()> {
        Ok(self.files.probe()?)
    }

    /// Scan the session directory and decode every metadata document.
    ///
    /// Undecodable files are skipped. Expired sessions are deleted from disk
    /// instead of being returned. Only a failure to list the directory
    /// itself is an error.
    pub fn load_all(&self, expiry: &ExpiryResolver, now: DateTime<Utc>) -> Result<LoadOutcome> {
        let mut outcome = LoadOutcome::default();

        for path in self.files.list()? {
            let Some(mut session) = self.load_file(&path) else {
                outcome.corrupt_skipped += 1;
                continue;
            };

            if expiry.is_expired(&session, now) {
                let destroyed = self.destroy(&session.session_id);
                tracing::debug!(
                    session_id = %session.session_id,
                    files_removed = destroyed.files_removed(),
                    "Removed expired session at startup"
                );
                outcome.expired_removed += 1;
                continue;
            }

            self.drop_missing_blobs(&mut session);
            outcome.sessions.push(session);
        }

        tracing::info!(
            loaded = outcome.sessions.len(),
            expired = outcome.expired_removed,
            corrupt = outcome.corrupt_skipped,
            "Loaded sessions from disk"
        );

        Ok(outcome)
    }

    fn load_file(&self, path: &Path) -> Option<Session> {
        let decoded = self
            .files
            .read_path(path)
            .map_err(SessionError::from)
            .and_then(|bytes| codec::from_bytes(&bytes));

        let session = match decoded {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                return None;
            }
        };

        // The file name is the identity on disk; a mismatch means the
        // document was copied or edited by hand.
        if SessionFiles::session_id_of(path).as_deref() != Some(session.session_id.as_str()) {
            tracing::warn!(
                path = %path.display(),
                session_id = %session.session_id,
                "Skipping session file whose name does not match its id"
            );
            return None;
        }

        Some(session)
    }

    /// A crash between blob write and metadata write, or a hand-deleted
    /// blob, leaves a dangling pointer. Clear it so the pointer is only set
    /// when the file exists.
    fn drop_missing_blobs(&self, session: &mut Session) {
        for (module, artifact) in session.artifacts.iter_mut() {
            let missing = match &artifact.blob {
                Some(blob) => self.blobs.size_of(&blob.path).is_none(),
                None => false,
            };
            if missing {
                tracing::warn!(
                    session_id = %session.session_id,
                    module = %module,
                    "Artifact blob missing on disk; clearing pointer"
                );
                artifact.blob = None;
            }
        }
    }
}
