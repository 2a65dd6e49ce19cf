//! Installation: placing fetched artifacts into the target layout.
//!
//! The installer takes a fetched source tree and a formula and copies the
//! declared `bin` artifacts into the layout's binary directory. The write
//! path is deliberately conservative:
//!
//! 1. Dependency check (read-only, no writes on failure)
//! 2. Pre-flight: every declared artifact must exist in the fetched tree
//! 3. Stage: artifacts are copied into a scratch directory inside the
//!    prefix and given executable permissions
//! 4. Commit: staged files are renamed into `bin/`; a failed rename rolls
//!    back the files this install already placed
//!
//! Staging inside the prefix keeps the final renames on one filesystem,
//! so a package either lands completely or not at all - verification
//! never observes a half-installed package.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::FormularyError;
use crate::formula::Formula;
use crate::utils::fs::{ensure_dir, is_executable, make_executable};
use crate::utils::platform::find_on_path;

/// The filesystem layout installs target.
///
/// Only the binary directory exists today; the layout type keeps the
/// "where do artifacts go" decision in one place.
#[derive(Debug, Clone)]
pub struct TargetLayout {
    prefix: PathBuf,
}

impl TargetLayout {
    /// Layout rooted at `prefix`.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// The layout root.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Directory executables are installed into.
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Deterministic installed path for a declared artifact: the bin
    /// directory plus the artifact's basename.
    pub fn bin_path(&self, artifact: &str) -> PathBuf {
        self.bin_dir().join(Formula::artifact_file_name(artifact))
    }

    /// Whether an executable named `name` is present in this layout.
    pub fn has_executable(&self, name: &str) -> bool {
        is_executable(&self.bin_dir().join(name))
    }
}

/// Outcome of a successful install.
#[derive(Debug)]
pub struct InstallOutcome {
    /// Package name.
    pub package: String,
    /// Final paths of all installed artifacts.
    pub installed: Vec<PathBuf>,
}

/// Installs a formula's declared artifacts from `tree` into `layout`.
///
/// Fails with [`FormularyError::MissingDependency`] (before any write)
/// when a declared dependency is satisfied neither by the layout nor by
/// PATH, and with [`FormularyError::InstallError`] when a declared
/// artifact is absent from the fetched tree or the filesystem rejects a
/// write.
pub async fn install(tree: &Path, formula: &Formula, layout: &TargetLayout) -> Result<InstallOutcome> {
    check_dependencies(formula, layout)?;

    // Pre-flight before any write.
    let mut sources = Vec::new();
    for artifact in &formula.install.bin {
        let source = tree.join(artifact);
        if !source.is_file() {
            return Err(FormularyError::InstallError {
                package: formula.name.clone(),
                reason: format!("declared artifact '{artifact}' not found in fetched source"),
            }
            .into());
        }
        sources.push((artifact.as_str(), source));
    }

    ensure_dir(layout.prefix()).map_err(|e| install_error(formula, &e))?;
    let bin_dir = layout.bin_dir();
    ensure_dir(&bin_dir).map_err(|e| install_error(formula, &e))?;

    // Stage inside the prefix so the commit renames stay on one
    // filesystem.
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(layout.prefix())
        .with_context(|| format!("Failed to create staging directory in {}", layout.prefix().display()))
        .map_err(|e| install_error(formula, &e))?;

    let mut staged = Vec::new();
    for (artifact, source) in &sources {
        let file_name = Formula::artifact_file_name(artifact);
        let staged_path = staging.path().join(file_name);
        std::fs::copy(source, &staged_path)
            .with_context(|| format!("Failed to stage '{artifact}'"))
            .map_err(|e| install_error(formula, &e))?;
        make_executable(&staged_path).map_err(|e| install_error(formula, &e))?;
        staged.push((staged_path, bin_dir.join(file_name)));
    }

    // Commit. Roll back this install's files if any rename fails.
    let mut placed: Vec<PathBuf> = Vec::new();
    for (from, to) in &staged {
        if let Err(e) = std::fs::rename(from, to) {
            for path in &placed {
                let _ = std::fs::remove_file(path);
            }
            return Err(install_error(
                formula,
                &anyhow::Error::new(e).context(format!("Failed to place {}", to.display())),
            ));
        }
        placed.push(to.clone());
    }

    tracing::info!(
        target: "install",
        "Installed {} artifact(s) for {}",
        placed.len(),
        formula.name
    );

    Ok(InstallOutcome {
        package: formula.name.clone(),
        installed: placed,
    })
}

/// Verifies every declared dependency is already installed.
///
/// A dependency is satisfied by an executable of its name in the layout's
/// bin directory or anywhere on PATH. This is a read-only query against
/// externally-managed state; formulary never resolves or installs
/// dependencies itself.
pub fn check_dependencies(formula: &Formula, layout: &TargetLayout) -> Result<()> {
    for dependency in &formula.dependencies {
        if layout.has_executable(dependency) || find_on_path(dependency).is_some() {
            continue;
        }
        return Err(FormularyError::MissingDependency {
            package: formula.name.clone(),
            dependency: dependency.clone(),
        }
        .into());
    }
    Ok(())
}

fn install_error(formula: &Formula, error: &anyhow::Error) -> anyhow::Error {
    FormularyError::InstallError {
        package: formula.name.clone(),
        reason: error.to_string(),
    }
    .into()
}
