//! SQLite schema for the versioned record collections
//!
//! Every collection is a table of JSON records keyed by their `id` field.
//! Secondary indexes are expression indexes over `json_extract` of the
//! indexed field(s), so lookups by index never decode unrelated records.
//!
//! Schema changes are additive version steps. A step only ever creates
//! tables or indexes that do not exist yet, so upgrading never touches
//! existing data.

use std::fmt;

use rusqlite::{Connection, OptionalExtension, Result};
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// A named record collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Games,
    Levels,
    WorldMaps,
    Graphics,
    UserTiles,
    BackgroundImages,
    Patterns,
}

impl Collection {
    /// Every collection, in declaration order
    pub const ALL: [Collection; 7] = [
        Collection::Games,
        Collection::Levels,
        Collection::WorldMaps,
        Collection::Graphics,
        Collection::UserTiles,
        Collection::BackgroundImages,
        Collection::Patterns,
    ];

    /// Table name of the collection
    pub fn name(self) -> &'static str {
        match self {
            Collection::Games => "games",
            Collection::Levels => "levels",
            Collection::WorldMaps => "worldmaps",
            Collection::Graphics => "graphics",
            Collection::UserTiles => "userTiles",
            Collection::BackgroundImages => "backgroundImages",
            Collection::Patterns => "patterns",
        }
    }

    /// Look a collection up by its table name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Secondary indexes declared on this collection
    pub fn indexes(self) -> &'static [Index] {
        match self {
            Collection::Games => &[GAMES_BY_USER_ID],
            Collection::Levels => &[LEVELS_BY_GAME_ID],
            Collection::Graphics => &[
                GRAPHICS_BY_USER_ID,
                GRAPHICS_BY_GAME_ID,
                GRAPHICS_BY_USER_ID_GAME_ID,
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An equality index over one or more top-level record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub collection: Collection,
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

impl Index {
    /// SQLite index name; index names are database-global so they carry the table name
    pub fn sql_name(&self) -> String {
        format!("{}_{}", self.collection.name(), self.name)
    }
}

pub const GAMES_BY_USER_ID: Index = Index {
    collection: Collection::Games,
    name: "by_userId",
    fields: &["userId"],
};

pub const LEVELS_BY_GAME_ID: Index = Index {
    collection: Collection::Levels,
    name: "by_gameId",
    fields: &["gameId"],
};

pub const GRAPHICS_BY_USER_ID: Index = Index {
    collection: Collection::Graphics,
    name: "by_userId",
    fields: &["userId"],
};

pub const GRAPHICS_BY_GAME_ID: Index = Index {
    collection: Collection::Graphics,
    name: "by_gameId",
    fields: &["gameId"],
};

pub const GRAPHICS_BY_USER_ID_GAME_ID: Index = Index {
    collection: Collection::Graphics,
    name: "by_userId_gameId",
    fields: &["userId", "gameId"],
};

/// SQL expression extracting a top-level JSON field from a record
pub(crate) fn field_expr(field: &str) -> String {
    format!("json_extract(record, '$.{}')", field)
}

/// One additive schema step
struct SchemaStep {
    version: i32,
    collections: &'static [Collection],
    indexes: &'static [Index],
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        collections: &[
            Collection::Games,
            Collection::Levels,
            Collection::WorldMaps,
            Collection::Graphics,
            Collection::UserTiles,
        ],
        indexes: &[
            GAMES_BY_USER_ID,
            LEVELS_BY_GAME_ID,
            GRAPHICS_BY_USER_ID,
            GRAPHICS_BY_GAME_ID,
        ],
    },
    SchemaStep {
        version: 2,
        collections: &[Collection::BackgroundImages, Collection::Patterns],
        indexes: &[],
    },
    SchemaStep {
        version: 3,
        collections: &[],
        indexes: &[GRAPHICS_BY_USER_ID_GAME_ID],
    },
];

/// Bring the schema up to [`SCHEMA_VERSION`]
///
/// Applies every step newer than the stored version inside one transaction.
/// Returns the version the database was at before upgrading.
pub fn init_schema(conn: &mut Connection) -> Result<i32> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current = get_schema_version(&tx)?.unwrap_or(0);
    info!("Schema version: {current}, target: {SCHEMA_VERSION}");

    for step in STEPS.iter().filter(|s| s.version > current) {
        debug!(version = step.version, "Applying schema step");

        for collection in step.collections {
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    id TEXT PRIMARY KEY NOT NULL,
                    record TEXT NOT NULL
                );",
                collection.name()
            ))?;
        }

        for index in step.indexes {
            let columns: Vec<String> = index.fields.iter().map(|f| field_expr(f)).collect();
            tx.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON \"{}\" ({});",
                index.sql_name(),
                index.collection.name(),
                columns.join(", ")
            ))?;
        }
    }

    if current < SCHEMA_VERSION {
        tx.execute(
            "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
            [SCHEMA_VERSION.to_string()],
        )?;
    }

    tx.commit()?;
    Ok(current)
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let table_exists = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")?
        .exists([])?;
    if !table_exists {
        return Ok(None);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.and_then(|v| v.parse().ok()))
}

/// Check if schema needs initialization or upgrade
pub fn needs_init(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
