//! Opening the versioned database
//!
//! Creates the data directory, applies connection pragmas, refuses
//! databases written by a newer schema, and brings older ones up to date.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use super::error::{StorageError, StorageResult};
use super::schema::{get_schema_version, init_schema, needs_init, SCHEMA_VERSION};

/// Open (or create) the database file and prepare its schema
///
/// `quota_bytes` caps the database size through `max_page_count`, so
/// writes past it fail with SQLite's "database or disk is full".
pub fn open_database(path: &Path, quota_bytes: Option<u64>) -> StorageResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| unavailable(path, e))?;
    }

    let conn = Connection::open(path).map_err(|e| unavailable(path, e))?;

    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        ",
    )
    .map_err(|e| unavailable(path, e))?;

    let conn = prepare(conn, quota_bytes).map_err(|e| unavailable(path, e))?;
    info!("Database ready: {}", path.display());
    Ok(conn)
}

/// Open a private in-memory database (for testing)
pub fn open_in_memory(quota_bytes: Option<u64>) -> StorageResult<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(conn, quota_bytes)
}

fn prepare(mut conn: Connection, quota_bytes: Option<u64>) -> StorageResult<Connection> {
    if let Some(version) = get_schema_version(&conn)? {
        if version > SCHEMA_VERSION {
            return Err(StorageError::Unavailable {
                reason: format!(
                    "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
                ),
            });
        }
    }

    if needs_init(&conn) {
        let previous = init_schema(&mut conn)?;
        info!(from = previous, to = SCHEMA_VERSION, "Schema upgraded");
    }

    if let Some(quota) = quota_bytes {
        apply_quota(&conn, quota)?;
    }

    Ok(conn)
}

/// Cap the database at `quota` bytes
///
/// SQLite never lowers `max_page_count` below the current page count, so a
/// database already over quota stays at its size and rejects growth.
fn apply_quota(conn: &Connection, quota: u64) -> StorageResult<()> {
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    let max_pages = (quota / page_size.max(1) as u64).max(1);
    let applied: i64 =
        conn.query_row(&format!("PRAGMA max_page_count = {max_pages}"), [], |row| {
            row.get(0)
        })?;
    info!(quota, max_pages, applied, "Storage quota applied");
    Ok(())
}

fn unavailable(path: &Path, error: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable {
        reason: format!("cannot open database at {}: {}", path.display(), error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_file_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("levelforge.db");

        let conn = open_database(&path, None).unwrap();

        assert!(path.exists());
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("levelforge.db");

        {
            let conn = open_database(&path, None).unwrap();
            conn.execute(
                "INSERT INTO games (id, record) VALUES ('g1', '{\"id\":\"g1\"}')",
                [],
            )
            .unwrap();
        }

        let conn = open_database(&path, None).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("levelforge.db");

        {
            let conn = open_database(&path, None).unwrap();
            conn.execute(
                "UPDATE schema_info SET value = ? WHERE key = 'version'",
                [(SCHEMA_VERSION + 1).to_string()],
            )
            .unwrap();
        }

        let err = open_database(&path, None).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }

    #[test]
    fn test_unwritable_location_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = open_database(&blocker.join("levelforge.db"), None).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }

    #[test]
    fn test_quota_sets_max_page_count() {
        let conn = open_in_memory(Some(1024 * 1024)).unwrap();

        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0)).unwrap();
        let max_pages: i64 = conn
            .query_row("PRAGMA max_page_count", [], |row| row.get(0))
            .unwrap();
        assert_eq!(max_pages, 1024 * 1024 / page_size);
    }
}
