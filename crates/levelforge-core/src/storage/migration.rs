//! One-time transfer of legacy blobs into the versioned collections
//!
//! Gated by [`MIGRATION_COMPLETE_KEY`] in the legacy medium: read before
//! migrating, written only after every blob was transferred. Writes are
//! upserts keyed by id, so an interrupted run can simply be repeated.

use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::legacy::{
    LegacyStore, LEGACY_BACKGROUND_IMAGES_KEY, LEGACY_LEVELS_KEY, LEGACY_PATTERNS_KEY,
    LEGACY_USER_TILES_KEY, MIGRATION_COMPLETE_KEY,
};
use super::repository::upsert;
use super::schema::Collection;
use crate::models::{
    BackgroundImage, Entity, Game, Graphic, Level, Pattern, UserTile, WorldMap,
};

/// Legacy blob key and the collection its records move to
const LEGACY_SOURCES: [(&str, Collection); 4] = [
    (LEGACY_LEVELS_KEY, Collection::Levels),
    (LEGACY_USER_TILES_KEY, Collection::UserTiles),
    (LEGACY_BACKGROUND_IMAGES_KEY, Collection::BackgroundImages),
    (LEGACY_PATTERNS_KEY, Collection::Patterns),
];

/// Outcome of a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The completion flag was already set; nothing was read
    pub already_complete: bool,
    /// Records transferred per collection (blobs that were present)
    pub migrated: Vec<(Collection, usize)>,
}

impl MigrationReport {
    /// Total number of records transferred
    pub fn total(&self) -> usize {
        self.migrated.iter().map(|(_, n)| n).sum()
    }
}

/// Check whether the completion flag is set
pub fn is_migration_complete(legacy: &dyn LegacyStore) -> StorageResult<bool> {
    Ok(legacy
        .get(MIGRATION_COMPLETE_KEY)?
        .is_some_and(|v| v.trim() == "true"))
}

/// Migrate legacy blobs into `conn`, unless already done
pub fn run_legacy_migration(
    conn: &mut Connection,
    legacy: &dyn LegacyStore,
) -> StorageResult<MigrationReport> {
    if is_migration_complete(legacy).map_err(|e| migration_error(MIGRATION_COMPLETE_KEY, e))? {
        debug!("Legacy migration already complete");
        return Ok(MigrationReport {
            already_complete: true,
            migrated: Vec::new(),
        });
    }

    let mut report = MigrationReport::default();

    for (key, collection) in LEGACY_SOURCES {
        let Some(blob) = legacy.get(key).map_err(|e| migration_error(key, e))? else {
            debug!(key, "No legacy data");
            continue;
        };

        let count = migrate_blob(conn, key, collection, &blob)?;
        info!(key, collection = %collection, count, "Migrated legacy records");
        report.migrated.push((collection, count));
    }

    legacy
        .set(MIGRATION_COMPLETE_KEY, "true")
        .map_err(|e| migration_error(MIGRATION_COMPLETE_KEY, e))?;

    info!(total = report.total(), "Legacy migration complete");
    Ok(report)
}

/// Upsert every entry of one blob inside a transaction on its collection
fn migrate_blob(
    conn: &mut Connection,
    key: &str,
    collection: Collection,
    blob: &str,
) -> StorageResult<usize> {
    let entries: Map<String, Value> =
        serde_json::from_str(blob).map_err(|e| migration_error(key, e))?;

    let tx = conn.transaction().map_err(|e| migration_error(key, e))?;
    let mut count = 0;
    for (entry_key, value) in entries {
        let record = normalize(collection, &entry_key, value)
            .and_then(|record| check_shape(collection, &entry_key, record))
            .map_err(|details| StorageError::Migration {
                key: key.to_string(),
                details,
            })?;
        upsert(&tx, collection, &record).map_err(|e| migration_error(key, e))?;
        count += 1;
    }
    tx.commit().map_err(|e| migration_error(key, e))?;

    Ok(count)
}

/// Make a legacy entry storable
///
/// Entries without a usable string id take their map key; legacy patterns
/// without a `source` were user-authored.
fn normalize(collection: Collection, entry_key: &str, value: Value) -> Result<Value, String> {
    let Value::Object(mut map) = value else {
        return Err(format!("entry '{entry_key}' is not a JSON object"));
    };

    let has_id = matches!(map.get("id"), Some(Value::String(id)) if !id.is_empty());
    if !has_id {
        map.insert("id".to_string(), Value::String(entry_key.to_string()));
    }

    if collection == Collection::Patterns && !map.contains_key("source") {
        map.insert("source".to_string(), Value::String("user".to_string()));
    }

    Ok(Value::Object(map))
}

/// Reject entries the typed models cannot read back
///
/// A stored record that fails to deserialize would make every list of its
/// collection fail, so it must stop the migration before the flag is set.
fn check_shape(collection: Collection, entry_key: &str, record: Value) -> Result<Value, String> {
    fn parses<E: Entity>(record: &Value) -> Result<(), serde_json::Error> {
        E::deserialize(record).map(|_| ())
    }

    let checked = match collection {
        Collection::Games => parses::<Game>(&record),
        Collection::Levels => parses::<Level>(&record),
        Collection::WorldMaps => parses::<WorldMap>(&record),
        Collection::Graphics => parses::<Graphic>(&record),
        Collection::UserTiles => parses::<UserTile>(&record),
        Collection::BackgroundImages => parses::<BackgroundImage>(&record),
        Collection::Patterns => parses::<Pattern>(&record),
    };
    checked
        .map(|()| record)
        .map_err(|e| format!("entry '{entry_key}' is not a valid {collection} record: {e}"))
}

fn migration_error(key: &str, error: impl std::fmt::Display) -> StorageError {
    StorageError::Migration {
        key: key.to_string(),
        details: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::legacy::MemoryLegacyStore;
    use crate::storage::schema::init_schema;
    use serde_json::json;

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        conn
    }

    fn count(conn: &Connection, collection: Collection) -> i64 {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", collection.name()),
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn record(conn: &Connection, collection: Collection, id: &str) -> Value {
        let raw: String = conn
            .query_row(
                &format!("SELECT record FROM \"{}\" WHERE id = ?", collection.name()),
                [id],
                |row| row.get(0),
            )
            .unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn seeded_legacy() -> MemoryLegacyStore {
        let legacy = MemoryLegacyStore::new();
        legacy
            .set(
                LEGACY_LEVELS_KEY,
                &json!({
                    "l1": {"id": "l1", "gameId": "g1", "name": "Intro"},
                    "l2": {"id": "l2", "gameId": "g1", "name": "Caves"}
                })
                .to_string(),
            )
            .unwrap();
        legacy
            .set(
                LEGACY_USER_TILES_KEY,
                &json!({"t1": {"id": "t1", "name": "Brick", "solid": true}}).to_string(),
            )
            .unwrap();
        legacy
            .set(
                LEGACY_BACKGROUND_IMAGES_KEY,
                &json!({"b1": {"id": "b1", "name": "Sky", "data": "data:", "createdAt": 1}})
                    .to_string(),
            )
            .unwrap();
        legacy
            .set(
                LEGACY_PATTERNS_KEY,
                &json!({
                    "p1": {"id": "p1", "name": "Stairs", "source": "system"},
                    "p2": {"id": "p2", "name": "Mine"}
                })
                .to_string(),
            )
            .unwrap();
        legacy
    }

    #[test]
    fn test_migrates_all_blobs_and_sets_flag() {
        let mut conn = conn();
        let legacy = seeded_legacy();

        let report = run_legacy_migration(&mut conn, &legacy).unwrap();

        assert!(!report.already_complete);
        assert_eq!(report.total(), 6);
        assert_eq!(count(&conn, Collection::Levels), 2);
        assert_eq!(count(&conn, Collection::UserTiles), 1);
        assert_eq!(count(&conn, Collection::BackgroundImages), 1);
        assert_eq!(count(&conn, Collection::Patterns), 2);
        assert!(is_migration_complete(&legacy).unwrap());
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut conn = conn();
        let legacy = seeded_legacy();
        run_legacy_migration(&mut conn, &legacy).unwrap();

        // Edit a migrated record; a rerun must not restore the legacy value
        conn.execute(
            "UPDATE levels SET record = ? WHERE id = 'l1'",
            [json!({"id": "l1", "gameId": "g1", "name": "Edited"}).to_string()],
        )
        .unwrap();

        let report = run_legacy_migration(&mut conn, &legacy).unwrap();

        assert!(report.already_complete);
        assert_eq!(report.total(), 0);
        assert_eq!(count(&conn, Collection::Levels), 2);
        assert_eq!(record(&conn, Collection::Levels, "l1")["name"], "Edited");
    }

    #[test]
    fn test_missing_blobs_are_skipped() {
        let mut conn = conn();
        let legacy = MemoryLegacyStore::new();
        legacy
            .set(LEGACY_USER_TILES_KEY, &json!({"t1": {"id": "t1"}}).to_string())
            .unwrap();

        let report = run_legacy_migration(&mut conn, &legacy).unwrap();

        assert_eq!(report.migrated, vec![(Collection::UserTiles, 1)]);
        assert!(is_migration_complete(&legacy).unwrap());
    }

    #[test]
    fn test_invalid_blob_leaves_flag_unset_and_retry_converges() {
        let mut conn = conn();
        let legacy = seeded_legacy();
        legacy.set(LEGACY_PATTERNS_KEY, "{not json").unwrap();

        let err = run_legacy_migration(&mut conn, &legacy).unwrap_err();
        assert!(matches!(err, StorageError::Migration { ref key, .. } if key == LEGACY_PATTERNS_KEY));
        assert!(!is_migration_complete(&legacy).unwrap());

        // Blobs before the bad one were applied already
        assert_eq!(count(&conn, Collection::Levels), 2);

        legacy
            .set(LEGACY_PATTERNS_KEY, &json!({"p1": {"id": "p1"}}).to_string())
            .unwrap();
        run_legacy_migration(&mut conn, &legacy).unwrap();

        assert_eq!(count(&conn, Collection::Levels), 2);
        assert_eq!(count(&conn, Collection::Patterns), 1);
        assert!(is_migration_complete(&legacy).unwrap());
    }

    #[test]
    fn test_non_object_entry_fails_migration() {
        let mut conn = conn();
        let legacy = MemoryLegacyStore::new();
        legacy
            .set(LEGACY_LEVELS_KEY, &json!({"l1": {"id": "l1"}, "l2": 7}).to_string())
            .unwrap();

        assert!(run_legacy_migration(&mut conn, &legacy).is_err());
        // The blob's transaction rolled back as a whole
        assert_eq!(count(&conn, Collection::Levels), 0);
        assert!(!is_migration_complete(&legacy).unwrap());
    }

    #[test]
    fn test_entries_the_models_cannot_read_fail_migration() {
        let mut conn = conn();
        let legacy = MemoryLegacyStore::new();
        legacy
            .set(
                LEGACY_LEVELS_KEY,
                &json!({"l1": {"id": "l1", "gameId": "g1", "tiles": [[-1, 0]]}}).to_string(),
            )
            .unwrap();

        let err = run_legacy_migration(&mut conn, &legacy).unwrap_err();
        assert!(matches!(err, StorageError::Migration { ref key, .. } if key == LEGACY_LEVELS_KEY));
        assert_eq!(count(&conn, Collection::Levels), 0);
        assert!(!is_migration_complete(&legacy).unwrap());

        // A corrected blob is picked up on the next run
        legacy
            .set(
                LEGACY_LEVELS_KEY,
                &json!({"l1": {"id": "l1", "gameId": "g1", "tiles": [[1, 0]]}}).to_string(),
            )
            .unwrap();
        legacy
            .set(
                LEGACY_BACKGROUND_IMAGES_KEY,
                &json!({"b1": {"createdAt": "2024-01-01T00:00:00Z"}}).to_string(),
            )
            .unwrap();

        let err = run_legacy_migration(&mut conn, &legacy).unwrap_err();
        assert!(
            matches!(err, StorageError::Migration { ref key, .. } if key == LEGACY_BACKGROUND_IMAGES_KEY)
        );
        assert_eq!(count(&conn, Collection::Levels), 1);
        assert_eq!(count(&conn, Collection::BackgroundImages), 0);
        assert!(!is_migration_complete(&legacy).unwrap());
    }

    #[test]
    fn test_normalization() {
        let mut conn = conn();
        let legacy = MemoryLegacyStore::new();
        legacy
            .set(
                LEGACY_PATTERNS_KEY,
                &json!({
                    "p-key": {"name": "No id"},
                    "p2": {"id": 2, "source": "system"}
                })
                .to_string(),
            )
            .unwrap();

        run_legacy_migration(&mut conn, &legacy).unwrap();

        let p1 = record(&conn, Collection::Patterns, "p-key");
        assert_eq!(p1["id"], "p-key");
        assert_eq!(p1["source"], "user");

        let p2 = record(&conn, Collection::Patterns, "p2");
        assert_eq!(p2["source"], "system");
    }
}
