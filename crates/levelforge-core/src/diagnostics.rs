//! Storage diagnostics and cleanup
//!
//! Capacity estimate, per-collection record counts, and the two bulk
//! cleanup operations offered to users who run out of space.

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::PatternSource;
use crate::storage::{Collection, StorageResult};
use crate::store::Store;

/// Space used by the database against the configured quota
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageEstimate {
    /// Bytes held by live records (freed pages excluded)
    pub usage: u64,
    /// Configured capacity in bytes
    pub quota: u64,
    /// `usage / quota`
    pub usage_ratio: f64,
    /// Bytes still writable before writes fail
    pub remaining: u64,
}

/// Record count per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageBreakdown {
    pub games: u64,
    pub levels: u64,
    pub world_maps: u64,
    pub graphics: u64,
    pub user_tiles: u64,
    pub background_images: u64,
    pub patterns: u64,
}

impl StorageBreakdown {
    pub fn total(&self) -> u64 {
        self.counts().iter().map(|(_, n)| n).sum()
    }

    /// Counts paired with their collection, in `Collection::ALL` order
    pub fn counts(&self) -> [(Collection, u64); 7] {
        [
            (Collection::Games, self.games),
            (Collection::Levels, self.levels),
            (Collection::WorldMaps, self.world_maps),
            (Collection::Graphics, self.graphics),
            (Collection::UserTiles, self.user_tiles),
            (Collection::BackgroundImages, self.background_images),
            (Collection::Patterns, self.patterns),
        ]
    }

    fn set(&mut self, collection: Collection, count: u64) {
        let slot = match collection {
            Collection::Games => &mut self.games,
            Collection::Levels => &mut self.levels,
            Collection::WorldMaps => &mut self.world_maps,
            Collection::Graphics => &mut self.graphics,
            Collection::UserTiles => &mut self.user_tiles,
            Collection::BackgroundImages => &mut self.background_images,
            Collection::Patterns => &mut self.patterns,
        };
        *slot = count;
    }
}

impl Store {
    /// Current usage against the configured quota
    ///
    /// Returns `None` when no quota is configured or the probe fails; this
    /// never returns an error.
    pub async fn get_storage_estimate(&self) -> Option<StorageEstimate> {
        let quota = self.config().quota_bytes?;

        let stats = match self.repo().await {
            Ok(repo) => repo.page_stats().await,
            Err(e) => Err(e),
        };
        let stats = match stats {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Storage estimate unavailable");
                return None;
            }
        };

        let usage = stats.used_bytes();
        let usage_ratio = if quota == 0 {
            1.0
        } else {
            usage as f64 / quota as f64
        };

        if usage_ratio >= self.config().warn_ratio {
            warn!(
                usage,
                quota,
                percent = format!("{:.1}", usage_ratio * 100.0),
                "Storage usage is high"
            );
        }

        Some(StorageEstimate {
            usage,
            quota,
            usage_ratio,
            remaining: stats.remaining_bytes(),
        })
    }

    /// Number of records in every collection
    pub async fn get_storage_breakdown(&self) -> StorageResult<StorageBreakdown> {
        let repo = self.repo().await?;
        let counts = try_join_all(Collection::ALL.iter().map(|&collection| async move {
            repo.count(collection).await.map(|n| (collection, n))
        }))
        .await?;

        let mut breakdown = StorageBreakdown::default();
        for (collection, count) in counts {
            breakdown.set(collection, count);
        }
        Ok(breakdown)
    }

    /// Delete every background image, returning how many were removed
    pub async fn clear_background_images(&self) -> StorageResult<usize> {
        let removed = self
            .repo()
            .await?
            .clear(Collection::BackgroundImages)
            .await?;
        info!(removed, "Background images cleared");
        Ok(removed)
    }

    /// Delete user-authored patterns; system patterns are kept
    pub async fn clear_patterns(&self) -> StorageResult<usize> {
        let removed = self
            .repo()
            .await?
            .delete_matching(Collection::Patterns, "source", PatternSource::User.as_str())
            .await?;
        info!(removed, "User patterns cleared");
        Ok(removed)
    }
}
