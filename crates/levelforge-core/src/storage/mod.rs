//! Storage layer
//!
//! ## Architecture
//!
//! - **SQLite**: versioned database holding one table per record collection
//! - **Legacy medium**: flat key-value files read once for migration
//!
//! `Store` (see `crate::store`) opens the database lazily, migrates legacy
//! data on first use, and routes every entity operation through the
//! `Repository` primitives.

pub mod database;
pub mod error;
pub mod legacy;
pub mod migration;
pub mod repository;
pub mod schema;

pub use error::{is_quota_exceeded_error, StorageError, StorageResult};
pub use legacy::{FileLegacyStore, LegacyStore, MemoryLegacyStore};
pub use migration::MigrationReport;
pub use repository::{IndexQuery, PageStats, Repository};
pub use schema::{Collection, Index, SCHEMA_VERSION};
