//! Generic record primitives over the named collections
//!
//! Records are JSON objects stored whole under their `id`. Each primitive
//! runs on the blocking pool in its own transaction scoped to a single
//! collection; nothing here spans collections.

use std::sync::{Arc, Mutex};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::schema::{field_expr, Collection, Index};

/// Equality lookup through a secondary index
///
/// `values` holds one value per indexed field, in declaration order.
#[derive(Debug, Clone)]
pub struct IndexQuery {
    pub index: Index,
    pub values: Vec<String>,
}

impl IndexQuery {
    pub fn new(index: Index, values: Vec<String>) -> Self {
        Self { index, values }
    }

    /// Lookup on a single-field index
    pub fn eq(index: Index, value: impl Into<String>) -> Self {
        Self::new(index, vec![value.into()])
    }

    fn validate(&self, collection: Collection) -> StorageResult<()> {
        if self.index.collection != collection {
            return Err(StorageError::InvalidQuery(format!(
                "index '{}' belongs to '{}', not '{}'",
                self.index.name, self.index.collection, collection
            )));
        }
        if self.values.len() != self.index.fields.len() {
            return Err(StorageError::InvalidQuery(format!(
                "index '{}' takes {} value(s), got {}",
                self.index.name,
                self.index.fields.len(),
                self.values.len()
            )));
        }
        Ok(())
    }
}

/// Page accounting of the database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub page_size: u64,
    pub page_count: u64,
    /// Pages freed by deletes; reused before the file grows
    pub freelist_count: u64,
    pub max_page_count: u64,
}

impl PageStats {
    /// Bytes held by live data
    pub fn used_bytes(&self) -> u64 {
        self.page_size * self.page_count.saturating_sub(self.freelist_count)
    }

    /// Bytes the database may grow to
    pub fn max_bytes(&self) -> u64 {
        self.page_size * self.max_page_count
    }

    /// Bytes still writable before the page limit is hit
    pub fn remaining_bytes(&self) -> u64 {
        self.max_bytes().saturating_sub(self.used_bytes())
    }
}

/// Shared handle to the ready database
#[derive(Clone)]
pub struct Repository {
    conn: Arc<Mutex<Connection>>,
}

impl Repository {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Fetch one record; absence is `None`
    pub async fn get(&self, collection: Collection, key: &str) -> StorageResult<Option<Value>> {
        let key = key.to_string();
        self.run("get", collection, move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    &format!("SELECT record FROM \"{}\" WHERE id = ?", collection.name()),
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|r| serde_json::from_str(&r))
                .transpose()
                .map_err(StorageError::from)
        })
        .await
    }

    /// Insert or fully overwrite a record keyed by its `id` field
    pub async fn put(&self, collection: Collection, record: Value) -> StorageResult<()> {
        self.run("put", collection, move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| StorageError::from_sqlite(e, collection.name()))?;
            let id = upsert(&tx, collection, &record)?;
            tx.commit()
                .map_err(|e| StorageError::from_sqlite(e, collection.name()))?;
            debug!(collection = %collection, id = %id, "Record stored");
            Ok(())
        })
        .await
    }

    /// Delete a record; deleting an absent key succeeds
    pub async fn delete(&self, collection: Collection, key: &str) -> StorageResult<()> {
        let key = key.to_string();
        self.run("delete", collection, move |conn| {
            let removed = conn
                .execute(
                    &format!("DELETE FROM \"{}\" WHERE id = ?", collection.name()),
                    params![key],
                )
                .map_err(|e| StorageError::from_sqlite(e, collection.name()))?;
            debug!(collection = %collection, id = %key, removed, "Record deleted");
            Ok(())
        })
        .await
    }

    /// Every record of a collection, or those matching an index lookup
    pub async fn get_all(
        &self,
        collection: Collection,
        query: Option<IndexQuery>,
    ) -> StorageResult<Vec<Value>> {
        if let Some(ref q) = query {
            q.validate(collection)?;
        }

        self.run("get_all", collection, move |conn| {
            let (sql, values) = match query {
                Some(q) => {
                    let clauses: Vec<String> = q
                        .index
                        .fields
                        .iter()
                        .map(|f| format!("{} = ?", field_expr(f)))
                        .collect();
                    (
                        format!(
                            "SELECT record FROM \"{}\" WHERE {} ORDER BY id",
                            collection.name(),
                            clauses.join(" AND ")
                        ),
                        q.values,
                    )
                }
                None => (
                    format!("SELECT record FROM \"{}\" ORDER BY id", collection.name()),
                    Vec::new(),
                ),
            };

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                row.get::<_, String>(0)
            })?;

            let mut records = Vec::new();
            for raw in rows {
                records.push(serde_json::from_str(&raw?)?);
            }
            Ok(records)
        })
        .await
    }

    /// Number of records in a collection
    pub async fn count(&self, collection: Collection) -> StorageResult<u64> {
        self.run("count", collection, move |conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", collection.name()),
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Delete every record of a collection, returning how many were removed
    pub async fn clear(&self, collection: Collection) -> StorageResult<usize> {
        self.run("clear", collection, move |conn| {
            conn.execute(&format!("DELETE FROM \"{}\"", collection.name()), [])
                .map_err(|e| StorageError::from_sqlite(e, collection.name()))
        })
        .await
    }

    /// Delete the records whose top-level `field` equals `value`
    pub async fn delete_matching(
        &self,
        collection: Collection,
        field: &'static str,
        value: impl Into<String>,
    ) -> StorageResult<usize> {
        let value = value.into();
        self.run("delete_matching", collection, move |conn| {
            conn.execute(
                &format!(
                    "DELETE FROM \"{}\" WHERE {} = ?",
                    collection.name(),
                    field_expr(field)
                ),
                params![value],
            )
            .map_err(|e| StorageError::from_sqlite(e, collection.name()))
        })
        .await
    }

    /// Page accounting used for quota estimates
    pub async fn page_stats(&self) -> StorageResult<PageStats> {
        let conn = Arc::clone(&self.conn);
        spawn_locked(conn, |conn| {
            let pragma = |name: &str| -> rusqlite::Result<u64> {
                conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get::<_, i64>(0))
                    .map(|v| v as u64)
            };
            Ok(PageStats {
                page_size: pragma("page_size")?,
                page_count: pragma("page_count")?,
                freelist_count: pragma("freelist_count")?,
                max_page_count: pragma("max_page_count")?,
            })
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool, logging failures
    async fn run<T, F>(&self, operation: &'static str, collection: Collection, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let result = spawn_locked(Arc::clone(&self.conn), f).await;
        if let Err(ref e) = result {
            warn!(
                operation,
                collection = %collection,
                quota_exceeded = e.is_quota_exceeded(),
                error = %e,
                "Storage operation failed"
            );
        }
        result
    }
}

async fn spawn_locked<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| StorageError::Task("connection lock poisoned".to_string()))?;
        f(&mut *guard)
    })
    .await
    .map_err(|e| StorageError::Task(format!("spawn_blocking failed: {e}")))?
}

/// Upsert a record inside an open transaction, returning its id
pub(crate) fn upsert(tx: &Transaction<'_>, collection: Collection, record: &Value) -> StorageResult<String> {
    let id = record_id(collection, record)?.to_string();
    let body = serde_json::to_string(record)?;
    tx.execute(
        &format!(
            "INSERT INTO \"{}\" (id, record) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET record = excluded.record",
            collection.name()
        ),
        params![id, body],
    )
    .map_err(|e| StorageError::from_sqlite(e, collection.name()))?;
    Ok(id)
}

fn record_id(collection: Collection, record: &Value) -> StorageResult<&str> {
    if !record.is_object() {
        return Err(StorageError::InvalidRecord {
            collection: collection.name().to_string(),
            details: "record is not a JSON object".to_string(),
        });
    }
    match record.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StorageError::InvalidRecord {
            collection: collection.name().to_string(),
            details: "missing string 'id' field".to_string(),
        }),
    }
}
