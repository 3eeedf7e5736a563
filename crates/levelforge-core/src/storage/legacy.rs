//! Legacy flat key-value storage
//!
//! The editor used to keep each collection as one JSON blob under a single
//! key. That medium is still read once for migration, and it also holds the
//! migration-complete flag so the flag survives the versioned database
//! being recreated.
//!
//! Files (file-backed medium, one per key):
//! - `levels`, `userTiles`, `backgroundImages`, `patterns` - legacy blobs
//! - `migrationComplete` - `"true"` once migration succeeded

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::{StorageError, StorageResult};

/// Legacy blob holding levels
pub const LEGACY_LEVELS_KEY: &str = "levels";
/// Legacy blob holding user-authored tiles
pub const LEGACY_USER_TILES_KEY: &str = "userTiles";
/// Legacy blob holding background images
pub const LEGACY_BACKGROUND_IMAGES_KEY: &str = "backgroundImages";
/// Legacy blob holding tile patterns
pub const LEGACY_PATTERNS_KEY: &str = "patterns";
/// One-shot flag recording a completed migration
pub const MIGRATION_COMPLETE_KEY: &str = "migrationComplete";

/// A simple string key-value medium
pub trait LegacyStore: Send + Sync {
    /// Read a value; a missing key is `None`
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key; removing a missing key succeeds
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Legacy medium backed by one file per key in a directory
#[derive(Debug, Clone)]
pub struct FileLegacyStore {
    dir: PathBuf,
}

impl FileLegacyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidQuery(format!(
                "invalid legacy key: {key:?}"
            )));
        }
        Ok(self.dir.join(key))
    }
}

impl LegacyStore for FileLegacyStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        atomic_write(&path, value.as_bytes()).map_err(|e| StorageError::from_io(e, path))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }
}

/// In-process legacy medium, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryLegacyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Task("legacy store lock poisoned".to_string()))
    }
}

impl LegacyStore for MemoryLegacyStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Write data to a file atomically
///
/// Writes to a temp file in the same directory, syncs it, then renames it
/// over the target so readers never see a partial value.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)
}
