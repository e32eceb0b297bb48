//! Generated artifact storage.
//!
//! Stage collaborators write through [`ArtifactStore::put`], which updates an
//! in-memory cache and the file on disk. Reads via [`ArtifactStore::get`]
//! consult the cache first and fall back to disk. Snapshots taken before a
//! regeneration bypass the cache so the diff reflects what is actually on disk.

use crate::errors::ArtifactError;
use crate::target::{ArtifactKind, Target};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ArtifactStore {
    test_dir: PathBuf,
    exploit_dir: PathBuf,
    cache: Mutex<HashMap<(Target, ArtifactKind), String>>,
}

impl ArtifactStore {
    pub fn new(test_dir: &Path, exploit_dir: &Path) -> Self {
        Self {
            test_dir: test_dir.to_path_buf(),
            exploit_dir: exploit_dir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// On-disk location of the artifact of `kind` for `target`.
    pub fn path(&self, target: &Target, kind: ArtifactKind) -> PathBuf {
        let dir = match kind {
            ArtifactKind::Test => &self.test_dir,
            ArtifactKind::Exploit => &self.exploit_dir,
        };
        dir.join(target.artifact_file_name(kind))
    }

    /// Current content: cached copy first, then disk. `None` if neither exists.
    pub fn get(
        &self,
        target: &Target,
        kind: ArtifactKind,
    ) -> Result<Option<String>, ArtifactError> {
        if let Some(content) = self.cached(target, kind) {
            return Ok(Some(content));
        }
        let content = self.read_snapshot(target, kind)?;
        if let Some(ref c) = content {
            self.cache_insert(target, kind, c.clone());
        }
        Ok(content)
    }

    /// Like [`Self::get`] but an absent artifact is an error.
    pub fn require(&self, target: &Target, kind: ArtifactKind) -> Result<String, ArtifactError> {
        self.get(target, kind)?.ok_or_else(|| ArtifactError::Missing {
            kind,
            target: target.clone(),
        })
    }

    /// Read the on-disk content, ignoring the cache.
    pub fn read_snapshot(
        &self,
        target: &Target,
        kind: ArtifactKind,
    ) -> Result<Option<String>, ArtifactError> {
        let path = self.path(target, kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArtifactError::Read { kind, path, source }),
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| ArtifactError::Encoding { kind, path })
    }

    /// Write the artifact to disk and refresh the cache.
    pub fn put(
        &self,
        target: &Target,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.path(target, kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Write {
                kind,
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, content).map_err(|source| ArtifactError::Write {
            kind,
            path: path.clone(),
            source,
        })?;
        self.cache_insert(target, kind, content.to_string());
        Ok(path)
    }

    /// Drop the cached copy so the next `get` reads from disk.
    pub fn invalidate(&self, target: &Target, kind: ArtifactKind) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&(target.clone(), kind));
        }
    }

    /// Remove the artifact from disk and cache. Returns whether a file was removed.
    pub fn delete(&self, target: &Target, kind: ArtifactKind) -> Result<bool, ArtifactError> {
        self.invalidate(target, kind);
        let path = self.path(target, kind);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtifactError::Delete { kind, path, source }),
        }
    }

    /// Delete both the test and exploit artifacts of `target`.
    pub fn delete_all(&self, target: &Target) -> Result<Vec<PathBuf>, ArtifactError> {
        let mut removed = Vec::new();
        for kind in [ArtifactKind::Test, ArtifactKind::Exploit] {
            if self.delete(target, kind)? {
                removed.push(self.path(target, kind));
            }
        }
        Ok(removed)
    }

    fn cached(&self, target: &Target, kind: ArtifactKind) -> Option<String> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&(target.clone(), kind)).cloned())
    }

    fn cache_insert(&self, target: &Target, kind: ArtifactKind, content: String) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert((target.clone(), kind), content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn make_store() -> (ArtifactStore, TempDir) {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(&dir.path().join("test"), &dir.path().join("exploits"));
        (store, dir)
    }

    #[test]
    fn test_put_writes_expected_paths() {
        let (store, dir) = make_store();
        let target = Target::new("Vault.sol");
        let test_path = store.put(&target, ArtifactKind::Test, "contract T {}").unwrap();
        let exploit_path = store.put(&target, ArtifactKind::Exploit, "contract E {}").unwrap();
        assert_eq!(test_path, dir.path().join("test/VaultTest.sol"));
        assert_eq!(exploit_path, dir.path().join("exploits/VaultExploit.sol"));
        assert_eq!(fs::read_to_string(test_path).unwrap(), "contract T {}");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (store, _dir) = make_store();
        let target = Target::new("Nothing");
        assert!(store.get(&target, ArtifactKind::Test).unwrap().is_none());
        assert!(matches!(
            store.require(&target, ArtifactKind::Test),
            Err(ArtifactError::Missing { .. })
        ));
    }

    #[test]
    fn test_get_prefers_cache_until_invalidated() {
        let (store, _dir) = make_store();
        let target = Target::new("Dex");
        let path = store.put(&target, ArtifactKind::Exploit, "v1").unwrap();

        // Out-of-band edit on disk is not visible through the cache.
        fs::write(&path, "v2").unwrap();
        assert_eq!(store.get(&target, ArtifactKind::Exploit).unwrap().as_deref(), Some("v1"));
        assert_eq!(
            store.read_snapshot(&target, ArtifactKind::Exploit).unwrap().as_deref(),
            Some("v2")
        );

        store.invalidate(&target, ArtifactKind::Exploit);
        assert_eq!(store.get(&target, ArtifactKind::Exploit).unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_get_falls_back_to_disk() {
        let (store, dir) = make_store();
        fs::create_dir_all(dir.path().join("test")).unwrap();
        fs::write(dir.path().join("test/BankTest.sol"), "from disk").unwrap();
        let content = store.get(&Target::new("Bank"), ArtifactKind::Test).unwrap();
        assert_eq!(content.as_deref(), Some("from disk"));
    }

    #[test]
    fn test_read_snapshot_rejects_invalid_utf8() {
        let (store, dir) = make_store();
        fs::create_dir_all(dir.path().join("test")).unwrap();
        fs::write(dir.path().join("test/BadTest.sol"), [0xff, 0xfe, 0x00]).unwrap();
        let err = store
            .read_snapshot(&Target::new("Bad"), ArtifactKind::Test)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Encoding { .. }));
    }

    #[test]
    fn test_delete_all_removes_files_and_cache() {
        let (store, _dir) = make_store();
        let target = Target::new("Vault");
        let test_path = store.put(&target, ArtifactKind::Test, "t").unwrap();
        let exploit_path = store.put(&target, ArtifactKind::Exploit, "e").unwrap();

        let removed = store.delete_all(&target).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!test_path.exists());
        assert!(!exploit_path.exists());
        assert!(store.get(&target, ArtifactKind::Test).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_is_not_an_error() {
        let (store, _dir) = make_store();
        assert!(!store.delete(&Target::new("Ghost"), ArtifactKind::Exploit).unwrap());
    }
}
