//! Artifact blob storage
//!
//! Binary artifacts live under `<root>/<session_id>/<module>_<unix_ts>[.<ext>]`,
//! separate from session metadata. Every write creates a new file; older
//! files for the same module are only removed with the whole session
//! directory.

use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::{validate_component, Result};

/// Location and fingerprint of a blob that was just written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the contents
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn session_dir(&self, session_id: &str) -> Result<PathBuf> {
        validate_component("session id", session_id)?;
        Ok(self.root.join(session_id))
    }

    /// Write a blob for one module of a session.
    ///
    /// Two writes within the same second get a numeric suffix rather than
    /// overwriting each other.
    pub fn write(
        &self,
        session_id: &str,
        module: &str,
        bytes: &[u8],
        extension: &str,
        unix_timestamp: i64,
    ) -> Result<StoredBlob> {
        validate_component("module", module)?;
        if !extension.is_empty() {
            validate_component("extension", extension)?;
        }

        let dir = self.session_dir(session_id)?;
        fs::create_dir_all(&dir)?;

        let mut attempt: u32 = 0;
        let (path, mut file) = loop {
            let stem = if attempt == 0 {
                format!("{module}_{unix_timestamp}")
            } else {
                format!("{module}_{unix_timestamp}_{attempt}")
            };
            let name = if extension.is_empty() {
                stem
            } else {
                format!("{stem}.{extension}")
            };
            let path = dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(bytes)?;
        file.sync_all()?;

        tracing::debug!(
            session_id = %session_id,
            module = %module,
            path = %path.display(),
            size = bytes.len(),
            "Wrote artifact blob"
        );

        Ok(StoredBlob {
            path,
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        })
    }

    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    /// Read a blob and check it against the digest recorded at write time
    pub fn read_verified(&self, path: &Path, expected_sha256: &str) -> Result<Vec<u8>> {
        let bytes = self.read(path)?;
        let actual = sha256_hex(&bytes);
        if actual != expected_sha256 {
            return Err(StorageError::DigestMismatch {
                path: path.display().to_string(),
                expected: expected_sha256.to_string(),
                actual,
            });
        }
        Ok(bytes)
    }

    /// Size of a blob on disk, or `None` if it does not exist
    pub fn size_of(&self, path: &Path) -> Option<u64> {
        fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Remove the whole blob directory of a session.
    ///
    /// Returns how many files were removed; a missing directory counts as
    /// zero, not as an error.
    pub fn delete_session_blobs(&self, session_id: &str) -> Result<usize> {
        let dir = self.session_dir(session_id)?;

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let file_count = entries.filter_map(|e| e.ok()).count();

        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(file_count),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_names_file_by_module_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path());

        let stored = blobs
            .write("s1", "identity", b"png-bytes", "png", 1_700_000_000)
            .unwrap();

        assert_eq!(stored.path, dir.path().join("s1/identity_1700000000.png"));
        assert_eq!(stored.size_bytes, 9);
        assert_eq!(blobs.read(&stored.path).unwrap(), b"png-bytes");
        assert_eq!(blobs.size_of(&stored.path), Some(9));
    }

    #[test]
    fn test_same_second_writes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path());

        let first = blobs.write("s1", "trust", b"one", "png", 42).unwrap();
        let second = blobs.write("s1", "trust", b"two", "png", 42).unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(second.path, dir.path().join("s1/trust_42_1.png"));
        assert_eq!(blobs.read(&first.path).unwrap(), b"one");
        assert_eq!(blobs.read(&second.path).unwrap(), b"two");
    }

    #[test]
    fn test_digest() {
        // Well-known SHA-256 of "abc"
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path());
        let stored = blobs.write("s1", "sensory", b"abc", "", 1).unwrap();

        assert_eq!(stored.path, dir.path().join("s1/sensory_1"));
        assert!(blobs.read_verified(&stored.path, &stored.sha256).is_ok());
        assert!(matches!(
            blobs.read_verified(&stored.path, "deadbeef"),
            Err(StorageError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn test_delete_session_blobs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path());

        blobs.write("s1", "identity", b"a", "png", 1).unwrap();
        blobs.write("s1", "identity", b"b", "png", 2).unwrap();
        blobs.write("s2", "identity", b"c", "png", 1).unwrap();

        assert_eq!(blobs.delete_session_blobs("s1").unwrap(), 2);
        assert!(!dir.path().join("s1").exists());
        assert!(dir.path().join("s2").exists());
        assert_eq!(blobs.delete_session_blobs("s1").unwrap(), 0);
    }

    #[test]
    fn test_rejects_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path());

        assert!(blobs.write("s1", "../x", b"a", "png", 1).is_err());
        assert!(blobs.write("s1", "identity", b"a", "p/g", 1).is_err());
        assert!(blobs.delete_session_blobs("..").is_err());
    }
}
