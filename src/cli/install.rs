//! The `install` command: the full pipeline for one or more packages.

use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::Cache;
use crate::cli::CliContext;
use crate::formula::Formula;
use crate::git::ensure_git_available;
use crate::installer::TargetLayout;
use crate::pipeline::{self, InstallReport, VerificationResult};

/// Arguments for `formulary install`.
#[derive(Args)]
pub struct InstallCommand {
    /// Packages to install.
    #[arg(required = true)]
    names: Vec<String>,

    /// Install prefix; binaries land in `<prefix>/bin`.
    #[arg(long, env = "FORMULARY_PREFIX")]
    prefix: Option<PathBuf>,

    /// Maximum number of packages processed concurrently.
    #[arg(long, default_value_t = default_parallelism())]
    max_parallel: usize,
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get().max(4))
}

impl InstallCommand {
    /// Runs the pipeline for every requested package, up to
    /// `--max-parallel` at a time, each in its own workspace.
    pub async fn execute(self, context: &CliContext) -> Result<()> {
        ensure_git_available()?;

        let layout = Arc::new(TargetLayout::new(
            self.prefix.clone().unwrap_or_else(|| context.prefix.clone()),
        ));
        let cache = Arc::new(Cache::new(context.cache_dir.clone()));

        // Load and validate every formula before starting any pipeline,
        // so a typo halts the whole request up front.
        let mut formulas = Vec::new();
        for name in &self.names {
            formulas.push(Formula::load(name, &context.formulae_dir)?);
        }

        let parallel = self.max_parallel.max(1);
        let results: Vec<(String, Result<InstallReport>)> = stream::iter(formulas)
            .map(|formula| {
                let cache = Arc::clone(&cache);
                let layout = Arc::clone(&layout);
                async move {
                    let name = formula.name.clone();
                    let result = pipeline::install_formula(&formula, &cache, &layout).await;
                    (name, result.map(|report| (formula, report)))
                }
            })
            .buffer_unordered(parallel)
            .map(|(name, result)| match result {
                Ok((formula, report)) => {
                    print_report(&formula, &report);
                    (name, Ok(report))
                }
                Err(e) => (name, Err(e)),
            })
            .collect()
            .await;

        let mut failures = 0usize;
        for (name, result) in &results {
            match result {
                Ok(report) if report.is_success() => {}
                Ok(_) => failures += 1,
                Err(e) => {
                    failures += 1;
                    eprintln!("{} {name}: {e:#}", "✗".red());
                }
            }
        }

        if failures > 0 {
            return Err(anyhow!(
                "{failures} of {} package(s) failed",
                results.len()
            ));
        }
        Ok(())
    }
}

/// Prints the human-readable outcome for one package: install summary,
/// caveats, then verification.
fn print_report(formula: &Formula, report: &InstallReport) {
    let pin = if report.artifact.pinned { "pinned" } else { "head" };
    println!(
        "{} {} {} ({} {})",
        "Installed".green().bold(),
        report.name.bold(),
        report.version,
        report.artifact.short_revision(),
        pin
    );
    for path in &report.installed {
        println!("  {}", path.display());
    }

    if let Some(caveats) = &formula.caveats {
        println!("\n{}", "Caveats:".yellow().bold());
        for line in caveats.trim_end().lines() {
            println!("  {line}");
        }
    }

    match &report.verification {
        VerificationResult::Passed => {
            println!("{} {} verified", "✓".green(), report.name);
        }
        VerificationResult::Skipped => {
            println!("{} {} has no test; verification skipped", "-".dimmed(), report.name);
        }
        VerificationResult::Failed { expected, actual } => {
            eprintln!(
                "{} {} installed but failed verification\n  expected: {expected}\n  actual:   {actual}",
                "✗".red(),
                report.name
            );
        }
    }
}
