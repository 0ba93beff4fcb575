//! Session metadata files
//!
//! One document per session at `<root>/<session_id>.json`. Each write lands
//! in its own uniquely named `.json.tmp` file first and is renamed into
//! place, so a crash mid-write leaves either the old document or the new
//! one, and concurrent writers never share a temp file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::{validate_component, Result};

const METADATA_EXT: &str = "json";
const TEMP_SUFFIX: &str = ".json.tmp";
const PROBE_PREFIX: &str = "health_check";
const PROBE_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct SessionFiles {
    root: PathBuf,
}

impl SessionFiles {
    /// Open the session directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    pub fn metadata_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_component("session id", session_id)?;
        Ok(self.root.join(format!("{session_id}.{METADATA_EXT}")))
    }

    /// Atomically replace the metadata document of a session
    pub fn write(&self, session_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.metadata_path(session_id)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{session_id}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;

        // A failed persist drops the temp file, which deletes it
        temp.persist(&path).map_err(|e| e.error)?;

        Ok(path)
    }

    pub fn read_path(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    /// List every metadata document in the directory, sorted by path.
    ///
    /// Temp files and blob directories are skipped.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) == Some(METADATA_EXT) {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Remove a metadata document. Returns `false` if it was already gone.
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        let path = self.metadata_path(session_id)?;
        remove_if_present(&path)
    }

    /// Create and delete a probe file to prove the directory is writable.
    ///
    /// Every call uses its own file, so concurrent probes do not interfere.
    pub fn probe(&self) -> Result<()> {
        let mut probe = tempfile::Builder::new()
            .prefix(PROBE_PREFIX)
            .suffix(PROBE_SUFFIX)
            .tempfile_in(&self.root)?;
        probe.write_all(b"test")?;
        probe.close()?;
        Ok(())
    }

    /// Session id encoded in a metadata file name
    pub fn session_id_of(path: &Path) -> Option<String> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
    }
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();

        let path = files.write("abc-123", b"{\"a\":1}").unwrap();
        assert_eq!(path, dir.path().join("abc-123.json"));
        assert_eq!(files.read_path(&path).unwrap(), b"{\"a\":1}");

        // Overwrite leaves no temp file behind
        files.write("abc-123", b"{\"a\":2}").unwrap();
        assert_eq!(files.read_path(&path).unwrap(), b"{\"a\":2}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_list_skips_temp_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();

        files.write("b", b"{}").unwrap();
        files.write("a", b"{}").unwrap();
        fs::write(dir.path().join("c.json.tmp"), b"partial").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let listed = files.list().unwrap();
        assert_eq!(
            listed,
            vec![dir.path().join("a.json"), dir.path().join("b.json")]
        );
        assert_eq!(SessionFiles::session_id_of(&listed[0]).as_deref(), Some("a"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();

        files.write("gone", b"{}").unwrap();
        assert!(files.remove("gone").unwrap());
        assert!(!files.remove("gone").unwrap());
        assert!(!dir.path().join("gone.json").exists());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();

        let err = files.write("../escape", b"{}").unwrap_err();
        assert!(matches!(err, StorageError::InvalidName { .. }));
    }

    #[test]
    fn test_probe() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/sessions");
        let files = SessionFiles::open(&root).unwrap();

        files.probe().unwrap();
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_writes_publish_whole_documents() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();
        let large = vec![b'x'; 64 * 1024];
        let small = b"small".to_vec();

        for _ in 0..50 {
            std::thread::scope(|scope| {
                for i in 0..4 {
                    let files = &files;
                    let bytes = if i % 2 == 0 { &large } else { &small };
                    scope.spawn(move || files.write("shared", bytes).unwrap());
                }
            });

            let written = files.read_path(&files.metadata_path("shared").unwrap()).unwrap();
            assert!(written == large || written == small);
        }

        assert_eq!(files.list().unwrap().len(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_probes_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::open(dir.path()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let files = &files;
                scope.spawn(move || {
                    for _ in 0..100 {
                        files.probe().unwrap();
                    }
                });
            }
        });

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
