//! Storage service
//!
//! `Store` is constructed once at startup and shared by reference. It owns
//! the lazily opened database handle:
//!
//! ```text
//! Uninitialized --first call--> Opening --ok--> Ready
//!                                  \--err--> Unavailable
//! ```
//!
//! Every caller arriving before the handle is ready awaits the same
//! initialization, so schema setup and legacy migration run exactly once
//! per `Store`. A failed open is remembered: the store stays
//! `Unavailable` until the process restarts.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new(Config::load()?);
//!
//! store.save_game(&game).await?;
//! let levels = store.list_levels(&game.id).await?;
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::storage::database::{open_database, open_in_memory};
use crate::storage::migration::{run_legacy_migration, MigrationReport};
use crate::storage::{FileLegacyStore, LegacyStore, Repository, StorageError, StorageResult};

/// Lifecycle state of the database handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Nothing has asked for the database yet
    Uninitialized,
    /// The first open (and migration) is in flight
    Opening,
    /// The database is open and usable
    Ready,
    /// Opening failed; no persistence for this process
    Unavailable,
}

#[derive(Debug, Clone)]
enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// The opened database plus what happened to legacy data on the way
struct ReadyHandle {
    repo: Repository,
    migration: Result<MigrationReport, String>,
}

/// Storage service for games, levels and editor assets
pub struct Store {
    config: Config,
    location: DatabaseLocation,
    legacy: Arc<dyn LegacyStore>,
    handle: OnceCell<Result<ReadyHandle, String>>,
    opening: AtomicBool,
}

impl Store {
    /// Store backed by the configured data directory
    ///
    /// Nothing is opened until the first operation.
    pub fn new(config: Config) -> Self {
        let legacy = Arc::new(FileLegacyStore::new(config.legacy_dir()));
        Self::with_legacy(config, legacy)
    }

    /// Store backed by the configured database and a caller-supplied legacy medium
    pub fn with_legacy(config: Config, legacy: Arc<dyn LegacyStore>) -> Self {
        let location = DatabaseLocation::File(config.database_path());
        Self::build(config, location, legacy)
    }

    /// Store backed by a private in-memory database (for testing)
    pub fn in_memory(config: Config, legacy: Arc<dyn LegacyStore>) -> Self {
        Self::build(config, DatabaseLocation::Memory, legacy)
    }

    fn build(config: Config, location: DatabaseLocation, legacy: Arc<dyn LegacyStore>) -> Self {
        Self {
            config,
            location,
            legacy,
            handle: OnceCell::new(),
            opening: AtomicBool::new(false),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current handle state
    pub fn state(&self) -> HandleState {
        match self.handle.get() {
            Some(Ok(_)) => HandleState::Ready,
            Some(Err(_)) => HandleState::Unavailable,
            None if self.opening.load(Ordering::Acquire) => HandleState::Opening,
            None => HandleState::Uninitialized,
        }
    }

    /// Open the database now instead of on first use
    pub async fn open(&self) -> StorageResult<()> {
        self.repo().await.map(|_| ())
    }

    /// Result of the legacy migration run during open
    ///
    /// `None` until the database is ready.
    pub fn migration_outcome(&self) -> Option<Result<&MigrationReport, &str>> {
        match self.handle.get() {
            Some(Ok(ready)) => Some(ready.migration.as_ref().map_err(String::as_str)),
            _ => None,
        }
    }

    /// The ready repository, opening the database on first call
    pub(crate) async fn repo(&self) -> StorageResult<&Repository> {
        let handle = self.handle.get_or_init(|| self.initialize()).await;
        match handle {
            Ok(ready) => Ok(&ready.repo),
            Err(reason) => Err(StorageError::Unavailable {
                reason: reason.clone(),
            }),
        }
    }

    async fn initialize(&self) -> Result<ReadyHandle, String> {
        self.opening.store(true, Ordering::Release);

        let location = self.location.clone();
        let quota = self.config.quota_bytes;
        let legacy = Arc::clone(&self.legacy);

        let opened = tokio::task::spawn_blocking(move || {
            let mut conn = match location {
                DatabaseLocation::File(ref path) => open_database(path, quota),
                DatabaseLocation::Memory => open_in_memory(quota),
            }?;

            // Migration failure leaves legacy data for the next start;
            // the database itself is still usable.
            let migration = run_legacy_migration(&mut conn, legacy.as_ref()).map_err(|e| {
                warn!(error = %e, "Legacy migration failed, will retry on next start");
                e.to_string()
            });

            Ok::<_, StorageError>(ReadyHandle {
                repo: Repository::new(conn),
                migration,
            })
        })
        .await;

        match opened {
            Ok(Ok(ready)) => {
                info!("Storage ready");
                Ok(ready)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Storage unavailable");
                Err(e.to_string())
            }
            Err(join) => {
                error!(error = %join, "Storage initialization task failed");
                Err(format!("initialization task failed: {join}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, Level};
    use crate::storage::legacy::{MemoryLegacyStore, LEGACY_LEVELS_KEY, MIGRATION_COMPLETE_KEY};
    use futures_util::future::join_all;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Legacy medium that counts completion-flag writes
    #[derive(Default)]
    struct CountingLegacy {
        inner: MemoryLegacyStore,
        flag_writes: AtomicUsize,
    }

    impl LegacyStore for CountingLegacy {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if key == MIGRATION_COMPLETE_KEY {
                self.flag_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key)
        }
    }

    fn test_config(temp_dir: &TempDir) -> Config {
        Config::with_data_dir(temp_dir.path())
    }

    #[tokio::test]
    async fn test_open_is_lazy() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let store = Store::new(config.clone());

        assert_eq!(store.state(), HandleState::Uninitialized);
        assert!(!config.database_path().exists());

        store.open().await.unwrap();

        assert_eq!(store.state(), HandleState::Ready);
        assert!(config.database_path().exists());
        assert!(store.migration_outcome().unwrap().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_share_one_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let legacy = Arc::new(CountingLegacy::default());
        legacy
            .set(LEGACY_LEVELS_KEY, &json!({"l1": {"id": "l1", "gameId": "g1"}}).to_string())
            .unwrap();
        let store = Arc::new(Store::with_legacy(test_config(&temp_dir), legacy.clone()));

        let tasks = (0..16).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .save_game(&Game::new(format!("g{i}"), "u1", "Game"))
                    .await
            })
        });
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(legacy.flag_writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.list_all_games().await.unwrap().len(), 16);
        assert!(store.load_level("l1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_open_is_fatal_for_the_store() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = Store::with_legacy(
            Config::with_data_dir(blocker.join("data")),
            Arc::new(MemoryLegacyStore::new()),
        );

        let err = store.load_game("g1").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert_eq!(store.state(), HandleState::Unavailable);

        // Fixing the cause does not revive this instance
        std::fs::remove_file(&blocker).unwrap();
        let err = store.save_game(&Game::new("g1", "u1", "Game")).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert!(store.migration_outcome().is_none());
    }

    #[tokio::test]
    async fn test_migration_failure_does_not_block_operations() {
        let legacy = Arc::new(MemoryLegacyStore::new());
        legacy.set(LEGACY_LEVELS_KEY, "[broken").unwrap();
        let store = Store::in_memory(Config::default(), legacy.clone());

        let level = Level::new("l1", "g1", "Intro", 2, 2);
        store.save_level(&level).await.unwrap();

        assert_eq!(store.state(), HandleState::Ready);
        assert!(store.migration_outcome().unwrap().is_err());
        assert!(legacy.get(MIGRATION_COMPLETE_KEY).unwrap().is_none());
        assert_eq!(store.load_level("l1").await.unwrap(), Some(level));
    }

    #[tokio::test]
    async fn test_unreadable_legacy_records_are_not_migrated() {
        let legacy = Arc::new(MemoryLegacyStore::new());
        legacy
            .set(
                LEGACY_LEVELS_KEY,
                &json!({"l1": {"id": "l1", "gameId": "g1", "tiles": [[-1, 0]]}}).to_string(),
            )
            .unwrap();
        let store = Store::in_memory(Config::default(), legacy.clone());

        assert!(store.list_all_levels().await.unwrap().is_empty());
        assert!(store.load_level("l1").await.unwrap().is_none());
        assert_eq!(store.get_storage_breakdown().await.unwrap().levels, 0);
        assert!(store.migration_outcome().unwrap().is_err());
        assert!(legacy.get(MIGRATION_COMPLETE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_migration_idempotent_across_restarts() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        let legacy = FileLegacyStore::new(config.legacy_dir());
        legacy
            .set(
                LEGACY_LEVELS_KEY,
                &json!({
                    "l1": {"id": "l1", "gameId": "g1", "name": "One"},
                    "l2": {"id": "l2", "gameId": "g1", "name": "Two"}
                })
                .to_string(),
            )
            .unwrap();

        {
            let store = Store::new(config.clone());
            assert_eq!(store.list_levels("g1").await.unwrap().len(), 2);
            let report = store.migration_outcome().unwrap().unwrap();
            assert_eq!(report.total(), 2);

            let mut edited = store.load_level("l1").await.unwrap().unwrap();
            edited.name = "Edited".to_string();
            store.save_level(&edited).await.unwrap();
        }

        // Legacy blob is still present; a restart must leave records alone
        let store = Store::new(config);
        let levels = store.list_levels("g1").await.unwrap();
        assert_eq!(levels.len(), 2);
        assert!(store.migration_outcome().unwrap().unwrap().already_complete);
        assert_eq!(store.load_level("l1").await.unwrap().unwrap().name, "Edited");
    }
}
