//! Typed entity operations on [`Store`]
//!
//! Each entity type gets save/load/list/delete wrappers that pick the right
//! collection and index. `save` is always a full overwrite.

use serde_json::Value;
use tracing::{debug, info};

use crate::models::{
    BackgroundImage, Entity, Game, Graphic, Level, Pattern, UserTile, WorldMap,
};
use crate::storage::schema::{
    GAMES_BY_USER_ID, GRAPHICS_BY_USER_ID, GRAPHICS_BY_USER_ID_GAME_ID, LEVELS_BY_GAME_ID,
};
use crate::storage::{IndexQuery, StorageResult};
use crate::store::Store;

impl Store {
    // ==================== Generic ====================

    /// Save any entity into its collection, replacing a record with the same id
    pub async fn save_entity<E: Entity>(&self, entity: &E) -> StorageResult<()> {
        let record = serde_json::to_value(entity)?;
        self.repo().await?.put(E::COLLECTION, record).await
    }

    async fn load_entity<E: Entity>(&self, id: &str) -> StorageResult<Option<E>> {
        let record = self.repo().await?.get(E::COLLECTION, id).await?;
        Ok(record.map(serde_json::from_value).transpose()?)
    }

    async fn list_entities<E: Entity>(&self, query: Option<IndexQuery>) -> StorageResult<Vec<E>> {
        let records = self.repo().await?.get_all(E::COLLECTION, query).await?;
        records
            .into_iter()
            .map(|r: Value| serde_json::from_value(r).map_err(Into::into))
            .collect()
    }

    async fn delete_entity<E: Entity>(&self, id: &str) -> StorageResult<()> {
        self.repo().await?.delete(E::COLLECTION, id).await
    }

    // ==================== Games ====================

    /// Save a game, replacing any game with the same id
    pub async fn save_game(&self, game: &Game) -> StorageResult<()> {
        self.save_entity(game).await
    }

    /// Load a game by id
    pub async fn load_game(&self, id: &str) -> StorageResult<Option<Game>> {
        self.load_entity(id).await
    }

    /// Games owned by `user_id`
    pub async fn list_games(&self, user_id: &str) -> StorageResult<Vec<Game>> {
        self.list_entities(Some(IndexQuery::eq(GAMES_BY_USER_ID, user_id)))
            .await
    }

    /// All games of every user
    pub async fn list_all_games(&self) -> StorageResult<Vec<Game>> {
        self.list_entities(None).await
    }

    /// Delete a game and every level that belongs to it
    ///
    /// Levels go first, one transaction each, then the game. The steps are
    /// not atomic together: a failure part-way leaves the game (and any
    /// levels not yet removed) in place, and calling this again finishes
    /// the job.
    pub async fn delete_game(&self, game_id: &str) -> StorageResult<()> {
        let levels = self.list_levels(game_id).await?;
        for level in &levels {
            self.delete_level(&level.id).await?;
        }
        self.delete_entity::<Game>(game_id).await?;

        info!(game_id, levels = levels.len(), "Game deleted");
        Ok(())
    }

    // ==================== Levels ====================

    /// Save a level, replacing any level with the same id
    pub async fn save_level(&self, level: &Level) -> StorageResult<()> {
        self.save_entity(level).await
    }

    /// Load a level by id
    pub async fn load_level(&self, id: &str) -> StorageResult<Option<Level>> {
        self.load_entity(id).await
    }

    /// Levels whose `gameId` is `game_id`
    pub async fn list_levels(&self, game_id: &str) -> StorageResult<Vec<Level>> {
        self.list_entities(Some(IndexQuery::eq(LEVELS_BY_GAME_ID, game_id)))
            .await
    }

    /// All levels of every game
    pub async fn list_all_levels(&self) -> StorageResult<Vec<Level>> {
        self.list_entities(None).await
    }

    /// Delete a level; a missing id is not an error
    pub async fn delete_level(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<Level>(id).await
    }

    // ==================== World maps ====================

    /// Save a world map, replacing any map with the same id
    pub async fn save_world_map(&self, map: &WorldMap) -> StorageResult<()> {
        self.save_entity(map).await
    }

    /// Load a world map by id
    pub async fn load_world_map(&self, id: &str) -> StorageResult<Option<WorldMap>> {
        self.load_entity(id).await
    }

    /// All world maps
    pub async fn list_world_maps(&self) -> StorageResult<Vec<WorldMap>> {
        self.list_entities(None).await
    }

    /// Delete a world map; a missing id is not an error
    pub async fn delete_world_map(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<WorldMap>(id).await
    }

    // ==================== Graphics ====================

    /// Save a graphic, replacing any graphic with the same id
    pub async fn save_graphic(&self, graphic: &Graphic) -> StorageResult<()> {
        self.save_entity(graphic).await
    }

    /// Load a graphic by id
    pub async fn load_graphic(&self, id: &str) -> StorageResult<Option<Graphic>> {
        self.load_entity(id).await
    }

    /// Graphics of `user_id`, optionally narrowed to one game
    ///
    /// Uses the compound userId+gameId index when a game is given.
    pub async fn list_graphics(
        &self,
        user_id: &str,
        game_id: Option<&str>,
    ) -> StorageResult<Vec<Graphic>> {
        let query = match game_id {
            Some(game_id) => IndexQuery::new(
                GRAPHICS_BY_USER_ID_GAME_ID,
                vec![user_id.to_string(), game_id.to_string()],
            ),
            None => IndexQuery::eq(GRAPHICS_BY_USER_ID, user_id),
        };
        let graphics = self.list_entities(Some(query)).await?;
        debug!(user_id, ?game_id, count = graphics.len(), "Listed graphics");
        Ok(graphics)
    }

    /// All graphics of every user
    pub async fn list_all_graphics(&self) -> StorageResult<Vec<Graphic>> {
        self.list_entities(None).await
    }

    /// Delete a graphic; a missing id is not an error
    pub async fn delete_graphic(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<Graphic>(id).await
    }

    // ==================== User tiles ====================

    /// Save a user tile, replacing any tile with the same id
    pub async fn save_user_tile(&self, tile: &UserTile) -> StorageResult<()> {
        self.save_entity(tile).await
    }

    /// Load a user tile by id
    pub async fn load_user_tile(&self, id: &str) -> StorageResult<Option<UserTile>> {
        self.load_entity(id).await
    }

    /// All user tiles
    pub async fn list_user_tiles(&self) -> StorageResult<Vec<UserTile>> {
        self.list_entities(None).await
    }

    /// Delete a user tile; a missing id is not an error
    pub async fn delete_user_tile(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<UserTile>(id).await
    }

    // ==================== Background images ====================

    /// Save a background image, replacing any image with the same id
    pub async fn save_background_image(&self, image: &BackgroundImage) -> StorageResult<()> {
        self.save_entity(image).await
    }

    /// Load a background image by id
    pub async fn load_background_image(&self, id: &str) -> StorageResult<Option<BackgroundImage>> {
        self.load_entity(id).await
    }

    /// All background images, newest first
    pub async fn list_background_images(&self) -> StorageResult<Vec<BackgroundImage>> {
        let mut images: Vec<BackgroundImage> = self.list_entities(None).await?;
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(images)
    }

    /// Delete a background image; a missing id is not an error
    pub async fn delete_background_image(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<BackgroundImage>(id).await
    }

    // ==================== Patterns ====================

    /// Save a pattern, replacing any pattern with the same id
    pub async fn save_pattern(&self, pattern: &Pattern) -> StorageResult<()> {
        self.save_entity(pattern).await
    }

    /// Load a pattern by id
    pub async fn load_pattern(&self, id: &str) -> StorageResult<Option<Pattern>> {
        self.load_entity(id).await
    }

    /// All patterns, system and user
    pub async fn list_patterns(&self) -> StorageResult<Vec<Pattern>> {
        self.list_entities(None).await
    }

    /// Delete a pattern; a missing id is not an error
    pub async fn delete_pattern(&self, id: &str) -> StorageResult<()> {
        self.delete_entity::<Pattern>(id).await
    }
}
