//! Import command handler
//!
//! Reads a JSON file holding either an array of records or an object keyed
//! by id (the shape older editor exports use) and saves every record into
//! one collection.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use levelforge_core::{
    BackgroundImage, Collection, Entity, Game, Graphic, Level, Pattern, Store, UserTile, WorldMap,
};

use crate::output::Output;

/// Import records from `file` into the named collection
pub async fn import(store: &Store, collection: String, file: PathBuf, output: &Output) -> Result<()> {
    let collection = Collection::from_name(&collection).ok_or_else(|| {
        let names: Vec<&str> = Collection::ALL.iter().map(|c| c.name()).collect();
        anyhow::anyhow!(
            "Unknown collection: '{}'\nValid collections: {}",
            collection,
            names.join(", ")
        )
    })?;

    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records = parse_records(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let count = import_records(store, collection, records).await?;

    output.success(&format!("Imported {} record(s) into {}", count, collection));
    Ok(())
}

/// Save already-parsed records into `collection`, returning how many were saved
pub async fn import_records(
    store: &Store,
    collection: Collection,
    records: Vec<Value>,
) -> Result<usize> {
    match collection {
        Collection::Games => save_all::<Game>(store, records).await,
        Collection::Levels => save_all::<Level>(store, records).await,
        Collection::WorldMaps => save_all::<WorldMap>(store, records).await,
        Collection::Graphics => save_all::<Graphic>(store, records).await,
        Collection::UserTiles => save_all::<UserTile>(store, records).await,
        Collection::BackgroundImages => save_all::<BackgroundImage>(store, records).await,
        Collection::Patterns => save_all::<Pattern>(store, records).await,
    }
}

/// Validate every record first so a malformed file saves nothing
async fn save_all<E: Entity>(store: &Store, records: Vec<Value>) -> Result<usize> {
    let entities = records
        .into_iter()
        .enumerate()
        .map(|(n, record)| {
            serde_json::from_value::<E>(record)
                .with_context(|| format!("Record {} is not a valid {} entry", n, E::COLLECTION))
        })
        .collect::<Result<Vec<E>>>()?;

    for entity in &entities {
        store
            .save_entity(entity)
            .await
            .with_context(|| format!("Failed to save {} '{}'", E::COLLECTION, entity.id()))?;
    }
    Ok(entities.len())
}

/// Accept an array of records or an object mapping id to record
///
/// In the keyed form a record without an `id` takes its key.
pub fn parse_records(content: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(records) => Ok(records),
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, value)| match value {
                Value::Object(mut record) => {
                    if !matches!(record.get("id"), Some(Value::String(id)) if !id.is_empty()) {
                        record.insert("id".to_string(), Value::String(key));
                    }
                    Ok(Value::Object(record))
                }
                _ => bail!("Entry '{}' is not a JSON object", key),
            })
            .collect(),
        _ => bail!("Expected a JSON array or object of records"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelforge_core::storage::MemoryLegacyStore;
    use levelforge_core::Config;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> Store {
        Store::in_memory(Config::default(), Arc::new(MemoryLegacyStore::new()))
    }

    #[test]
    fn test_parse_array() {
        let records = parse_records(r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_keyed_object_fills_missing_ids() {
        let records =
            parse_records(r#"{"l1": {"gameId": "g1"}, "x": {"id": "l2", "gameId": "g1"}}"#)
                .unwrap();
        let mut ids: Vec<&str> = records.iter().filter_map(|r| r["id"].as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["l1", "l2"]);
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(parse_records("42").is_err());
        assert!(parse_records(r#"{"l1": 5}"#).is_err());
        assert!(parse_records("not json").is_err());
    }

    #[tokio::test]
    async fn test_import_levels() {
        let store = store();
        let records = vec![
            json!({"id": "l1", "gameId": "g1", "name": "One"}),
            json!({"id": "l2", "gameId": "g1", "name": "Two"}),
        ];

        let count = import_records(&store, Collection::Levels, records).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.list_levels("g1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_record_saves_nothing() {
        let store = store();
        let records = vec![
            json!({"id": "p1", "source": "user"}),
            json!({"id": "p2", "source": "someone"}),
        ];

        assert!(import_records(&store, Collection::Patterns, records).await.is_err());
        assert!(store.list_patterns().await.unwrap().is_empty());
    }
}
