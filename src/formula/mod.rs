//! Formula loading and validation.
//!
//! A formula is the declarative descriptor for one package: what it is,
//! where its source lives, which artifacts to install, and how to check
//! the result. Formulas are TOML files named `<package>.toml` inside a
//! formulae directory:
//!
//! ```toml
//! name = "mxp"
//! description = "Pipe content between terminal and Emacs buffers"
//! homepage = "https://github.com/agzam/emacs-piper"
//! version = "0.4.0"
//! license = "MIT"
//! dependencies = ["emacs"]
//! caveats = """
//! mxp requires an Emacs daemon to be running.
//! """
//!
//! [source]
//! url = "https://github.com/agzam/emacs-piper.git"
//! branch = "main"
//!
//! [install]
//! bin = ["mxp"]
//!
//! [test]
//! command = "{bin}/mxp --version"
//! expect = "mxp v0.4.0"
//! ```
//!
//! A formula is immutable once loaded: it is parsed at command time,
//! validated, threaded through the pipeline by reference, and dropped when
//! the operation completes. Nothing in this crate ever mutates or
//! persists one.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::FormularyError;

/// Declarative descriptor for one installable package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Unique package identifier; also the formula's file stem.
    pub name: String,

    /// Human-readable one-line summary.
    pub description: String,

    /// Project homepage, informational only.
    #[serde(default)]
    pub homepage: Option<String>,

    /// Semantic version of the packaged software.
    pub version: String,

    /// License identifier (e.g. "MIT").
    #[serde(default)]
    pub license: Option<String>,

    /// Names of packages that must already be installed. Checked, never
    /// resolved, at install time.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Advisory text shown to the user after a successful install.
    #[serde(default)]
    pub caveats: Option<String>,

    /// Where and how to obtain the source.
    pub source: SourceSpec,

    /// What to place into the target layout.
    pub install: InstallSpec,

    /// Post-install smoke test. Optional; verification is skipped when
    /// absent.
    #[serde(default)]
    pub test: Option<TestSpec>,
}

/// Source location: a git URL plus exactly one revision selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Git repository URL (https, ssh, or file://).
    pub url: String,

    /// Track the tip of this branch (a mutable "head" install).
    #[serde(default)]
    pub branch: Option<String>,

    /// Install this tag (pinned, reproducible).
    #[serde(default)]
    pub tag: Option<String>,

    /// Install this exact commit (pinned, reproducible).
    #[serde(default)]
    pub rev: Option<String>,
}

/// Artifacts to install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Paths, relative to the fetched tree, of executables to place in
    /// the layout's bin directory.
    pub bin: Vec<String>,
}

/// Post-install verification: a command template and an expected-output
/// matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Command template. `{bin}` expands to the layout's bin directory,
    /// `{name}` and `{version}` to the formula fields.
    pub command: String,

    /// Pattern the combined output must match: treated as a regex when it
    /// compiles, as a literal substring otherwise.
    pub expect: String,
}

impl Formula {
    /// Loads and validates the formula for `name` from `formulae_dir`.
    pub fn load(name: &str, formulae_dir: &Path) -> Result<Self> {
        let path = Self::path_for(name, formulae_dir);
        if !path.is_file() {
            return Err(FormularyError::FormulaNotFound {
                name: name.to_string(),
                dir: formulae_dir.display().to_string(),
            }
            .into());
        }
        let formula = Self::load_from_path(&path)?;
        if formula.name != name {
            return Err(FormularyError::FormulaValidationError {
                name: name.to_string(),
                reason: format!(
                    "formula file {} declares name '{}'",
                    path.display(),
                    formula.name
                ),
            }
            .into());
        }
        Ok(formula)
    }

    /// Loads and validates a formula from an explicit file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| FormularyError::IoError(e))?;
        let formula: Self =
            toml::from_str(&content).map_err(|e| FormularyError::FormulaParseError {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        formula.validate()?;
        Ok(formula)
    }

    /// Enumerates all formulas in a directory, skipping unparseable files.
    pub fn load_all(formulae_dir: &Path) -> Result<Vec<Self>> {
        let mut formulas = Vec::new();
        if !formulae_dir.is_dir() {
            return Ok(formulas);
        }
        for entry in std::fs::read_dir(formulae_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(formula) => formulas.push(formula),
                Err(e) => {
                    tracing::warn!("Skipping invalid formula {}: {e}", path.display());
                }
            }
        }
        formulas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(formulas)
    }

    /// Checks the structural invariants a parsed formula must hold.
    ///
    /// - `name` is a lowercase identifier
    /// - `version` is non-empty, valid semver
    /// - exactly one of `branch` / `tag` / `rev` is set
    /// - a `rev` selector is 7-40 hex digits
    /// - `install.bin` is non-empty
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> anyhow::Error {
            FormularyError::FormulaValidationError {
                name: self.name.clone(),
                reason,
            }
            .into()
        };

        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
            || !self.name.starts_with(|c: char| c.is_ascii_alphanumeric())
        {
            return Err(invalid(format!(
                "name '{}' must be lowercase alphanumeric with ._- separators",
                self.name
            )));
        }

        if self.version.is_empty() {
            return Err(invalid("version must be non-empty".to_string()));
        }
        semver::Version::parse(&self.version)
            .map_err(|e| invalid(format!("version '{}' is not semver: {e}", self.version)))?;

        let selectors = [&self.source.branch, &self.source.tag, &self.source.rev]
            .iter()
            .filter(|s| s.is_some())
            .count();
        if selectors != 1 {
            return Err(invalid(
                "source must set exactly one of branch, tag, or rev".to_string(),
            ));
        }

        if let Some(rev) = &self.source.rev {
            if rev.len() < 7 || rev.len() > 40 || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid(format!("rev '{rev}' must be 7-40 hex digits")));
            }
        }

        if self.install.bin.is_empty() {
            return Err(invalid("install.bin must list at least one artifact".to_string()));
        }
        for artifact in &self.install.bin {
            if artifact.is_empty() || artifact.starts_with('/') || artifact.contains("..") {
                return Err(invalid(format!(
                    "install.bin entry '{artifact}' must be a relative path inside the source tree"
                )));
            }
        }

        if let Some(test) = &self.test {
            if test.command.trim().is_empty() || test.expect.is_empty() {
                return Err(invalid("test requires both command and expect".to_string()));
            }
        }

        Ok(())
    }

    /// Whether this formula's source selector is pinned (tag or rev) as
    /// opposed to tracking a moving branch head.
    pub fn is_pinned(&self) -> bool {
        self.source.branch.is_none()
    }

    /// Installed file name of a declared bin artifact (its basename).
    pub fn artifact_file_name(artifact: &str) -> &str {
        Path::new(artifact)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(artifact)
    }

    /// The path the formula file for `name` would occupy in a directory.
    pub fn path_for(name: &str, formulae_dir: &Path) -> PathBuf {
        formulae_dir.join(format!("{name}.toml"))
    }
}
