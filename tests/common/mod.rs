//! Shared fixtures for formulary integration tests.
//!
//! `TestGit` drives real git repositories used as package sources;
//! `TestEnvironment` gives every test an isolated formulae directory,
//! install prefix, cache, and config so parallel tests never interfere.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Git command helper for building fixture repositories.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| format!("Failed to run git {args:?}"))?;
        anyhow::ensure!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn init(&self) -> Result<()> {
        self.run(&["init"])?;
        self.run(&["config", "user.email", "test@formulary.example"])?;
        self.run(&["config", "user.name", "Test User"])?;
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run(&["add", "."])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run(&["commit", "-m", message])?;
        Ok(())
    }

    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run(&["tag", "-a", tag_name, "-m", tag_name])?;
        Ok(())
    }

    pub fn head(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> Result<String> {
        self.run(&["branch", "--show-current"])
    }
}

/// A fixture source repository holding one executable script.
pub struct SourceRepo {
    pub url: String,
    pub branch: String,
    pub head: String,
}

/// Isolated environment for one integration test.
pub struct TestEnvironment {
    temp: TempDir,
    pub formulae_dir: PathBuf,
    pub prefix: PathBuf,
    pub cache_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let formulae_dir = temp.path().join("formulae");
        let prefix = temp.path().join("prefix");
        let cache_dir = temp.path().join("cache");
        fs::create_dir_all(&formulae_dir)?;
        Ok(Self { temp, formulae_dir, prefix, cache_dir })
    }

    /// Creates a source repository whose script prints
    /// `<name> v<version>`, committed with the executable bit set.
    pub fn create_source_repo(&self, name: &str, version: &str) -> Result<SourceRepo> {
        self.create_source_repo_with_output(name, &format!("{name} v{version}"))
    }

    /// Creates a source repository whose script prints `output` verbatim.
    pub fn create_source_repo_with_output(&self, name: &str, output: &str) -> Result<SourceRepo> {
        let repo_path = self.temp.path().join(format!("src-{name}"));
        fs::create_dir_all(&repo_path)?;

        let script = repo_path.join(name);
        fs::write(&script, format!("#!/bin/sh\necho \"{output}\"\n"))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        }
        fs::write(repo_path.join("README.md"), format!("# {name}\n"))?;

        let git = TestGit::new(&repo_path);
        git.init()?;
        git.add_all()?;
        git.commit("initial")?;

        Ok(SourceRepo {
            url: format!("file://{}", repo_path.display()),
            branch: git.current_branch()?,
            head: git.head()?,
        })
    }

    /// Tags the fixture repo for `name` with an annotated tag.
    pub fn tag_source_repo(&self, name: &str, tag: &str) -> Result<()> {
        TestGit::new(self.temp.path().join(format!("src-{name}"))).tag(tag)
    }

    /// Writes a formula file under the formulae directory.
    pub fn write_formula(&self, name: &str, content: &str) -> Result<()> {
        fs::write(self.formulae_dir.join(format!("{name}.toml")), content)?;
        Ok(())
    }

    /// A standard formula for a fixture repo: depends on `sh`, installs
    /// one binary, expects `<name> v<version>` from `--version`.
    pub fn write_standard_formula(
        &self,
        name: &str,
        version: &str,
        source: &SourceRepo,
        selector: &str,
    ) -> Result<()> {
        let content = format!(
            r#"
name = "{name}"
description = "Test package {name}"
version = "{version}"
license = "MIT"
dependencies = ["sh"]
caveats = """
{name} requires an Emacs daemon to be running.
Start the daemon with:
  emacs --daemon
"""

[source]
url = "{url}"
{selector}

[install]
bin = ["{name}"]

[test]
command = "{{bin}}/{name} --version"
expect = "{name} v{version}"
"#,
            url = source.url,
        );
        self.write_formula(name, content.trim_start())
    }

    /// Installed path of a binary in this environment's prefix.
    pub fn bin_path(&self, name: &str) -> PathBuf {
        self.prefix.join("bin").join(name)
    }

    /// A formulary command wired to this environment's directories.
    pub fn formulary_command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("formulary").expect("binary exists");
        cmd.env("FORMULARY_CONFIG", self.temp.path().join("config.toml"))
            .env("FORMULARY_FORMULAE_DIR", &self.formulae_dir)
            .env("FORMULARY_CACHE_DIR", &self.cache_dir)
            .env("FORMULARY_PREFIX", &self.prefix)
            .env_remove("RUST_LOG");
        cmd
    }
}

/// Whether a file is executable by the current user.
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
