//! keychain2bitwarden CLI - Sync macOS Keychain passwords to Bitwarden
//!
//! Usage:
//!   keychain2bitwarden              - Report keychain entries missing from Bitwarden
//!   keychain2bitwarden --write      - Create the missing entries
//!   keychain2bitwarden -v           - Verbose (debug) logging
//!
//! Exit codes: 0 success, 1 error (auth, read, failed items), 2 invalid arguments.

mod cli;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Argument errors exit with code 2 inside clap
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match format!("keychain2bitwarden={}", log_level).parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli::commands::sync(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::from(1)
        }
    }
}
