//! Data models for the level editor
//!
//! Records are stored as JSON with camelCase field names. The editor may
//! attach fields the engine does not know about; they are kept in `extra`
//! so a load-then-save never drops them.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::Collection;

/// A record type stored in one collection
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    /// Collection holding records of this type
    const COLLECTION: Collection;

    /// Caller-assigned primary key
    fn id(&self) -> &str;
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A game project owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Game {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }
}

impl Entity for Game {
    const COLLECTION: Collection = Collection::Games;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A solid rectangle placed in a level, in tile units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Platform {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One level of a game: a tile grid plus platforms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: String,
    pub game_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Row-major tile indices; 0 is empty
    #[serde(default)]
    pub tiles: Vec<Vec<u32>>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Level {
    /// An empty level of the given size
    pub fn new(
        id: impl Into<String>,
        game_id: impl Into<String>,
        name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            game_id: game_id.into(),
            name: name.into(),
            width,
            height,
            tiles: vec![vec![0; width as usize]; height as usize],
            platforms: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }
}

impl Entity for Level {
    const COLLECTION: Collection = Collection::Levels;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Overworld map linking levels together
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorldMap {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for WorldMap {
    const COLLECTION: Collection = Collection::WorldMaps;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Uploaded or drawn artwork
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Graphic {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Image payload, usually a data URL
    #[serde(default)]
    pub data: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Graphic {
    const COLLECTION: Collection = Collection::Graphics;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A user-defined tile type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphic_id: Option<String>,
    #[serde(default)]
    pub solid: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for UserTile {
    const COLLECTION: Collection = Collection::UserTiles;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: String,
    /// Creation time in epoch milliseconds; lists are newest first
    #[serde(default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BackgroundImage {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data: data.into(),
            created_at: now_millis(),
            extra: Map::new(),
        }
    }
}

impl Entity for BackgroundImage {
    const COLLECTION: Collection = Collection::BackgroundImages;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Who owns a pattern
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    /// Shipped with the editor; survives cleanup
    System,
    /// Authored by the user
    User,
}

impl PatternSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternSource::System => "system",
            PatternSource::User => "user",
        }
    }
}

/// A reusable block of tiles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub source: PatternSource,
    #[serde(default)]
    pub tiles: Vec<Vec<u32>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Pattern {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: PatternSource) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source,
            tiles: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl Entity for Pattern {
    const COLLECTION: Collection = Collection::Patterns;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_new_builds_empty_grid() {
        let level = Level::new("l1", "g1", "Intro", 4, 3);
        assert_eq!(level.tiles.len(), 3);
        assert!(level.tiles.iter().all(|row| row.len() == 4 && row.iter().all(|&t| t == 0)));
        assert_eq!(level.created_at, level.updated_at);
    }

    #[test]
    fn test_camel_case_fields() {
        let game = Game::new("g1", "u1", "Platformer");
        let value = serde_json::to_value(&game).unwrap();

        assert_eq!(value["userId"], "u1");
        assert!(value.get("user_id").is_none());
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let raw = json!({
            "id": "g1",
            "gameId": "x",
            "userId": "u1",
            "thumbnail": "data:image/png;base64,AAAA",
            "settings": {"gravity": 9.8}
        });

        let graphic: Graphic = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(graphic.game_id.as_deref(), Some("x"));
        assert_eq!(graphic.extra["thumbnail"], "data:image/png;base64,AAAA");

        let back = serde_json::to_value(&graphic).unwrap();
        assert_eq!(back["settings"], raw["settings"]);
    }

    #[test]
    fn test_pattern_source_serialization() {
        let pattern = Pattern::new("p1", "Stairs", PatternSource::System);
        let value = serde_json::to_value(&pattern).unwrap();
        assert_eq!(value["source"], "system");
        assert_eq!(PatternSource::User.as_str(), "user");

        let parsed: Pattern =
            serde_json::from_value(json!({"id": "p2", "source": "user"})).unwrap();
        assert_eq!(parsed.source, PatternSource::User);

        assert!(serde_json::from_value::<Pattern>(json!({"id": "p3", "source": "other"})).is_err());
    }

    #[test]
    fn test_entity_collections() {
        assert_eq!(Game::COLLECTION.name(), "games");
        assert_eq!(Level::COLLECTION.name(), "levels");
        assert_eq!(WorldMap::COLLECTION.name(), "worldmaps");
        assert_eq!(Graphic::COLLECTION.name(), "graphics");
        assert_eq!(UserTile::COLLECTION.name(), "userTiles");
        assert_eq!(BackgroundImage::COLLECTION.name(), "backgroundImages");
        assert_eq!(Pattern::COLLECTION.name(), "patterns");
    }
}
