//! The `cache` command: inspect or wipe the git clone cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::cache::Cache;
use crate::cli::CliContext;

/// Arguments for `formulary cache`.
#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Show cache location, entry count, and size.
    Info,
    /// Delete all cached clones.
    Clean,
}

impl CacheCommand {
    /// Executes the selected cache operation.
    pub async fn execute(self, context: &CliContext) -> Result<()> {
        let cache = Cache::new(context.cache_dir.clone());
        match self.command {
            CacheSubcommand::Info => {
                let size = cache.size()?;
                println!("{} {}", "Cache location:".bold(), cache.root().display());
                println!("{} {}", "Cached clones:".bold(), cache.entry_count()?);
                println!("{} {}", "Total size:".bold(), human_size(size));
            }
            CacheSubcommand::Clean => {
                let size = cache.size()?;
                cache.clear()?;
                println!("{} freed {}", "Cache cleaned:".green().bold(), human_size(size));
            }
        }
        Ok(())
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
