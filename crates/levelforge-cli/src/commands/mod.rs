//! Command handlers

pub mod browse;
pub mod clear;
pub mod config;
pub mod game;
pub mod import;
pub mod status;

use std::io::{self, IsTerminal, Write};

use anyhow::Result;

/// Ask a yes/no question; anything but "y"/"yes" (or no terminal) is a no
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
