//! The `list` command: formulas whose artifacts are installed.
//!
//! There is no receipt store; installed state is derived by checking the
//! layout for every formula's declared binaries.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::CliContext;
use crate::formula::Formula;
use crate::installer::TargetLayout;

/// Output format for `list`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// Machine-readable JSON array.
    Json,
}

/// Arguments for `formulary list`.
#[derive(Args)]
pub struct ListCommand {
    /// Output format.
    #[arg(long, value_enum, default_value = "table")]
    format: ListFormat,

    /// Install prefix to inspect.
    #[arg(long, env = "FORMULARY_PREFIX")]
    prefix: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct ListEntry {
    name: String,
    version: String,
    description: String,
    pinned: bool,
}

impl ListCommand {
    /// Prints every formula whose declared binaries all exist in the
    /// layout.
    pub async fn execute(self, context: &CliContext) -> Result<()> {
        let layout =
            TargetLayout::new(self.prefix.clone().unwrap_or_else(|| context.prefix.clone()));
        let formulas = Formula::load_all(&context.formulae_dir)?;

        let installed: Vec<ListEntry> = formulas
            .iter()
            .filter(|f| {
                f.install
                    .bin
                    .iter()
                    .all(|artifact| layout.bin_path(artifact).is_file())
            })
            .map(|f| ListEntry {
                name: f.name.clone(),
                version: f.version.clone(),
                description: f.description.clone(),
                pinned: f.is_pinned(),
            })
            .collect();

        match self.format {
            ListFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&installed)?);
            }
            ListFormat::Table => {
                if installed.is_empty() {
                    println!("No installed packages under {}", layout.prefix().display());
                    return Ok(());
                }
                println!("{}", "Installed packages:".bold());
                for entry in &installed {
                    let pin = if entry.pinned { "pinned" } else { "head" };
                    println!(
                        "  {} {} ({pin}) - {}",
                        entry.name.bold(),
                        entry.version,
                        entry.description
                    );
                }
            }
        }
        Ok(())
    }
}
