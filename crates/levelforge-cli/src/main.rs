//! LevelForge CLI
//!
//! Command-line interface for the LevelForge storage engine: inspect the
//! database, list and import records, and free up space.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use levelforge_core::{is_quota_exceeded_error, Config, Store};

mod commands;
mod output;

use commands::clear::ClearTarget;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "levelforge")]
#[command(about = "LevelForge - level editor storage")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database state, quota usage and record counts
    Status,
    /// List games
    Games {
        /// Only games owned by this user
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List the levels of a game
    Levels {
        /// Game ID
        game: String,
    },
    /// List a user's graphics
    Graphics {
        /// User ID
        user: String,
        /// Only graphics of this game
        #[arg(short, long)]
        game: Option<String>,
    },
    /// Delete a game and all of its levels
    #[command(alias = "rm")]
    DeleteGame {
        /// Game ID
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Import records from a JSON file
    Import {
        /// Target collection (games, levels, worldmaps, graphics, userTiles, backgroundImages, patterns)
        collection: String,
        /// JSON file with an array of records or an object keyed by id
        file: PathBuf,
    },
    /// Free up space
    Clear {
        #[arg(value_enum)]
        target: ClearTarget,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, quota_bytes, warn_ratio)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli.command, &output).await;

    if let Err(ref e) = result {
        let quota = e.chain().any(is_quota_exceeded_error);
        if quota && !output.is_quiet() {
            eprintln!(
                "⚠ Storage is full. Free up space with `levelforge clear backgrounds` \
                 or `levelforge clear patterns`, then try again."
            );
        }
    }

    result
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    // Config commands don't need the store
    if let Commands::Config { command } = command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(output),
            Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
        };
    }

    let config = Config::load()?;
    debug!(data_dir = %config.data_dir.display(), quota = ?config.quota_bytes, "Using configuration");
    let store = Store::new(config);

    match command {
        Commands::Status => commands::status::show(&store, output).await,
        Commands::Games { user } => commands::browse::games(&store, user, output).await,
        Commands::Levels { game } => commands::browse::levels(&store, game, output).await,
        Commands::Graphics { user, game } => {
            commands::browse::graphics(&store, user, game, output).await
        }
        Commands::DeleteGame { id, yes } => commands::game::delete(&store, id, yes, output).await,
        Commands::Import { collection, file } => {
            commands::import::import(&store, collection, file, output).await
        }
        Commands::Clear { target, yes } => {
            commands::clear::clear(&store, target, yes, output).await
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Log to stderr, filtered by LEVELFORGE_LOG (default: warn)
fn init_logging() {
    let env_filter =
        EnvFilter::try_from_env("LEVELFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
