//! Formulary CLI entry point.
//!
//! Parses arguments, executes the command, and renders failures through
//! the user-friendly error layer before exiting non-zero.

use anyhow::Result;
use clap::Parser;
use formulary::cli;
use formulary::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let context = user_friendly_error(e);
            context.display();
            std::process::exit(1);
        }
    }
}
