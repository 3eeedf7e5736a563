//! Game command handlers

use anyhow::{Context, Result};

use levelforge_core::Store;

use crate::commands::confirm;
use crate::output::Output;

/// Delete a game together with its levels
pub async fn delete(store: &Store, id: String, yes: bool, output: &Output) -> Result<()> {
    let game = store
        .load_game(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Game not found: {}", id))?;
    let level_count = store.list_levels(&id).await?.len();

    if !yes && output.should_prompt() {
        println!(
            "Delete game: {} - {} ({} level(s))",
            game.id, game.name, level_count
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store
        .delete_game(&id)
        .await
        .with_context(|| format!("Failed to delete game {}", id))?;

    output.success(&format!(
        "Deleted game {} and {} level(s)",
        id, level_count
    ));
    Ok(())
}
