//! Write-once artefact stores, used by compiler passes to memoize expensive
//! precomputations across runs.

use crate::IopError;
use anyhow::Context;
use ark_std::collections::HashMap;
use parking_lot::RwLock;
use std::{io::Write, path::PathBuf};
use tempfile::NamedTempFile;

/// Key/value store refusing to overwrite an existing key
pub trait Store: Send + Sync {
    /// `Ok(None)` on a miss
    fn try_load(&self, key: &str) -> Result<Option<Vec<u8>>, IopError>;

    /// Fails with [`IopError::ArtefactExists`] if `key` is already stored
    fn store(&self, key: &str, data: &[u8]) -> Result<(), IopError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemStore {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Store for MemStore {
    fn try_load(&self, key: &str) -> Result<Option<Vec<u8>>, IopError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<(), IopError> {
        let mut inner = self.inner.write();
        if inner.contains_key(key) {
            return Err(IopError::ArtefactExists(key.to_string()));
        }
        inner.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// One file per key under a root directory.
///
/// Writes go through a temporary file in the same directory which is then
/// atomically linked to its final name, so a concurrent writer of the same key
/// gets `ArtefactExists` instead of a torn file.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, IopError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(IopError::InvalidArtefactKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl Store for FsStore {
    fn try_load(&self, key: &str) -> Result<Option<Vec<u8>>, IopError> {
        let path = self.path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path)
            .with_context(|| format!("reading artefact {}", path.display()))?;
        Ok(Some(data))
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<(), IopError> {
        let path = self.path(key)?;
        std::fs::create_dir_all(&self.root)?;
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                IopError::ArtefactExists(key.to_string())
            } else {
                IopError::Io(e.error)
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_once(store: &dyn Store) {
        assert_eq!(store.try_load("k").unwrap(), None);
        store.store("k", b"hello").unwrap();
        assert_eq!(store.try_load("k").unwrap().unwrap(), b"hello");
        assert!(matches!(
            store.store("k", b"world"),
            Err(IopError::ArtefactExists(_))
        ));
        // the first write wins
        assert_eq!(store.try_load("k").unwrap().unwrap(), b"hello");
    }

    #[test]
    fn test_mem_store() {
        let store = MemStore::new();
        write_once(&store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("cache"));
        write_once(&store);
        for bad in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.store(bad, b"x"),
                Err(IopError::InvalidArtefactKey(_))
            ));
        }
        // no stray temporary file is left behind
        let entries = std::fs::read_dir(dir.path().join("cache")).unwrap().count();
        assert_eq!(entries, 1);
    }
}
