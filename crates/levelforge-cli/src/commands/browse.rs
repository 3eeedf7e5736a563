//! Listing command handlers

use anyhow::{Context, Result};

use levelforge_core::Store;

use crate::output::Output;

/// List games, optionally only those of one user
pub async fn games(store: &Store, user: Option<String>, output: &Output) -> Result<()> {
    let games = match user {
        Some(ref user) => store.list_games(user).await,
        None => store.list_all_games().await,
    }
    .context("Failed to list games")?;

    output.print_games(&games);
    Ok(())
}

/// List the levels of a game
pub async fn levels(store: &Store, game_id: String, output: &Output) -> Result<()> {
    let levels = store
        .list_levels(&game_id)
        .await
        .with_context(|| format!("Failed to list levels of game {}", game_id))?;

    output.print_levels(&levels);
    Ok(())
}

/// List a user's graphics, optionally narrowed to one game
pub async fn graphics(
    store: &Store,
    user_id: String,
    game_id: Option<String>,
    output: &Output,
) -> Result<()> {
    let graphics = store
        .list_graphics(&user_id, game_id.as_deref())
        .await
        .context("Failed to list graphics")?;

    output.print_graphics(&graphics);
    Ok(())
}
