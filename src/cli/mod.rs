//! CLI definitions và command implementations cho keychain2bitwarden.

pub mod commands;
pub mod prompt;

use clap::Parser;

/// Sync macOS Keychain passwords to Bitwarden
#[derive(Parser, Debug)]
#[command(name = "keychain2bitwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Create missing items in Bitwarden (default: dry-run, report only)
    #[arg(long)]
    pub write: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
