//! Command-line interface for formulary.
//!
//! Each command lives in its own module with a clap args struct and an
//! async `execute()`. Global flags resolve the three directories every
//! command may need - the formulae directory, the install prefix, and the
//! cache - with CLI flags winning over environment variables winning over
//! the global config file.
//!
//! # Commands
//!
//! - `install <name>...` - run the full pipeline for one or more packages
//! - `test <name>` - re-run a package's verification against the
//!   installed layout
//! - `list` - show formulas whose artifacts are installed
//! - `cache info` / `cache clean` - inspect or wipe the clone cache

mod cache;
mod install;
mod list;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::GlobalConfig;

/// Top-level CLI: global flags plus a subcommand.
#[derive(Parser)]
#[command(
    name = "formulary",
    about = "Formula-driven installer for binaries fetched from Git sources",
    version,
    long_about = "Formulary installs packages described by declarative TOML formulas: \
                  resolve the source to a concrete revision, fetch it into a scoped \
                  workspace, install the declared binaries, and verify the result."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the global config file.
    #[arg(long, global = true, env = "FORMULARY_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing <name>.toml formula files.
    #[arg(long, global = true, env = "FORMULARY_FORMULAE_DIR")]
    formulae_dir: Option<PathBuf>,

    /// Root directory of the git clone cache.
    #[arg(long, global = true, env = "FORMULARY_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Install one or more packages from their formulas.
    Install(install::InstallCommand),

    /// Run a package's verification against the installed layout.
    Test(test::TestCommand),

    /// List formulas whose declared binaries are installed.
    List(list::ListCommand),

    /// Inspect or clean the git clone cache.
    Cache(cache::CacheCommand),
}

/// Directories every command resolves from flags, environment, and
/// config.
pub struct CliContext {
    /// Directory of formula files.
    pub formulae_dir: PathBuf,
    /// Install prefix (binaries land in `<prefix>/bin`).
    pub prefix: PathBuf,
    /// Cache root for git clones.
    pub cache_dir: PathBuf,
}

impl Cli {
    /// Executes the parsed command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let config = match &self.config {
            Some(path) => GlobalConfig::load_from(path)?,
            None => GlobalConfig::load()?,
        };

        let cache_dir = match self.cache_dir.clone() {
            Some(dir) => dir,
            None => config.cache_dir()?,
        };
        let context = CliContext {
            formulae_dir: self
                .formulae_dir
                .clone()
                .unwrap_or_else(|| config.formulae_dir()),
            prefix: config.prefix()?,
            cache_dir,
        };

        match self.command {
            Commands::Install(cmd) => cmd.execute(&context).await,
            Commands::Test(cmd) => cmd.execute(&context).await,
            Commands::List(cmd) => cmd.execute(&context).await,
            Commands::Cache(cmd) => cmd.execute(&context).await,
        }
    }

    /// Installs the tracing subscriber according to the verbosity flags.
    ///
    /// `RUST_LOG` wins when set; `-v` maps to debug, `-q` to off, default
    /// to warn so normal runs stay clean.
    fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let default = if self.quiet {
            "off"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
