//! Storage error handling
//!
//! Provides typed errors for storage operations with descriptive messages
//! and recovery suggestions. Capacity exhaustion is classified at the
//! write site into its own variant so callers can branch on it without
//! knowing which engine produced it.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database cannot be opened; no persistence is possible
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// A write failed because the storage capacity is exhausted
    #[error("Storage quota exceeded while writing to '{target}'. Free up space and try again.")]
    QuotaExceeded {
        target: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Legacy data could not be parsed or transferred
    #[error("Migration of legacy key '{key}' failed: {details}")]
    Migration { key: String, details: String },

    /// Record cannot be stored as given
    #[error("Invalid record for '{collection}': {details}")]
    InvalidRecord { collection: String, details: String },

    /// Index lookup does not match the index declaration
    #[error("Invalid index query: {0}")]
    InvalidQuery(String),

    /// Failed to read or write a legacy key-value entry
    #[error("Legacy storage error at '{path}': {source}")]
    Legacy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking storage task was cancelled or panicked
    #[error("Storage task failed: {0}")]
    Task(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Classify a SQLite failure raised while writing to `target`
    ///
    /// `SQLITE_FULL` (disk full or `max_page_count` reached) becomes
    /// `QuotaExceeded`; everything else stays a database error.
    pub fn from_sqlite(error: rusqlite::Error, target: &str) -> Self {
        if is_sqlite_full(&error) {
            StorageError::QuotaExceeded {
                target: target.to_string(),
                source: Box::new(error),
            }
        } else {
            StorageError::Database(error)
        }
    }

    /// Classify an I/O failure on a legacy key-value file
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if is_disk_full_error(&error) {
            StorageError::QuotaExceeded {
                target: path.display().to_string(),
                source: Box::new(error),
            }
        } else {
            StorageError::Legacy {
                path,
                source: error,
            }
        }
    }

    /// Check if this error reports exhausted storage capacity
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::QuotaExceeded { .. } | StorageError::Migration { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::QuotaExceeded { .. } => Some(
                "Free up space, for example by clearing background images or user patterns, then try again.",
            ),
            StorageError::Migration { .. } => {
                Some("Legacy data will be migrated again on the next start.")
            }
            StorageError::Unavailable { .. } => Some(
                "Check that the data directory exists and is writable, then restart.",
            ),
            _ => None,
        }
    }
}

/// Check whether an error, or anything in its source chain, is a quota failure
///
/// True only for [`StorageError::QuotaExceeded`]. Other engine failures,
/// including other SQLite error codes, are not quota failures.
pub fn is_quota_exceeded_error(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(storage) = err.downcast_ref::<StorageError>() {
            if storage.is_quota_exceeded() {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn is_sqlite_full(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DiskFull
    )
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    // Check error message for disk full indicators
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
