//! Cleanup command handlers

use anyhow::{Context, Result};
use clap::ValueEnum;

use levelforge_core::Store;

use crate::commands::confirm;
use crate::output::{format_bytes, Output};

/// What `clear` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    /// Every background image
    Backgrounds,
    /// User-authored patterns (system patterns are kept)
    Patterns,
}

/// Free space by removing background images or user patterns
pub async fn clear(store: &Store, target: ClearTarget, yes: bool, output: &Output) -> Result<()> {
    let description = match target {
        ClearTarget::Backgrounds => "all background images",
        ClearTarget::Patterns => "all user patterns",
    };

    if !yes && output.should_prompt() {
        println!("Delete {}", description);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = match target {
        ClearTarget::Backgrounds => store.clear_background_images().await,
        ClearTarget::Patterns => store.clear_patterns().await,
    }
    .with_context(|| format!("Failed to delete {}", description))?;

    output.success(&format!("Removed {} record(s)", removed));

    if let Some(estimate) = store.get_storage_estimate().await {
        output.message(&format!(
            "Storage now at {:.1}% of quota ({} free)",
            estimate.usage_ratio * 100.0,
            format_bytes(estimate.remaining)
        ));
    }
    Ok(())
}
