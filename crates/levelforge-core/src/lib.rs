//! LevelForge Core Library
//!
//! Persistent storage engine for the LevelForge level editor: games,
//! levels, world maps, graphics, user tiles, background images and tile
//! patterns, kept in a local versioned SQLite database.
//!
//! # Architecture
//!
//! - **SQLite**: one table per collection, JSON records, expression indexes
//! - **Legacy medium**: flat key-value files from older editor versions,
//!   migrated into the database once on first open
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::new(Config::load()?);
//!
//! store.save_game(&Game::new("g1", "u1", "Jumper")).await?;
//! store.save_level(&Level::new("l1", "g1", "Intro", 32, 18)).await?;
//!
//! let levels = store.list_levels("g1").await?;
//! ```
//!
//! # Modules
//!
//! - `store`: lazily opened storage service (main entry point)
//! - `services`: typed save/load/list/delete per entity
//! - `diagnostics`: quota estimate, record counts, cleanup
//! - `models`: record types
//! - `storage`: schema, repository, legacy migration, errors
//! - `config`: application configuration

pub mod config;
pub mod diagnostics;
pub mod models;
pub mod services;
pub mod storage;
pub mod store;

pub use config::Config;
pub use diagnostics::{StorageBreakdown, StorageEstimate};
pub use models::{
    BackgroundImage, Entity, Game, Graphic, Level, Pattern, PatternSource, Platform, UserTile,
    WorldMap,
};
pub use storage::{
    is_quota_exceeded_error, Collection, MigrationReport, StorageError, StorageResult,
    SCHEMA_VERSION,
};
pub use store::{HandleState, Store};
