//! Type-safe builder for executing git commands.
//!
//! Every git invocation in formulary goes through [`GitCommand`]: one
//! place for working-directory handling (`-C`), timeouts, tracing, and the
//! mapping of failures onto [`FormularyError`] variants. Git is driven as
//! a subprocess rather than through a binding, so authentication, proxies,
//! and credential helpers behave exactly as the user's git does.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::FormularyError;
use crate::utils::platform::get_git_command;

/// Builder for a single git invocation.
///
/// Commands default to a 5-minute timeout and captured output. Use the
/// convenience constructors ([`GitCommand::clone_repo`],
/// [`GitCommand::ls_remote`], ...) rather than assembling argument lists
/// at call sites.
pub struct GitCommand {
    /// Arguments passed to git (e.g. `["fetch", "--all", "--tags"]`).
    args: Vec<String>,

    /// Working directory, passed via `git -C` so execution is independent
    /// of the process cwd.
    current_dir: Option<std::path::PathBuf>,

    /// Maximum duration to wait for completion (None = no deadline).
    timeout_duration: Option<Duration>,

    /// For clone commands, the URL kept aside for error reporting.
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Some(Duration::from_secs(300)),
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Creates an empty builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for the command.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Overrides the command deadline (None disables it).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Executes the command and returns its captured output.
    ///
    /// A non-zero exit status is an error: clone and checkout failures map
    /// to their dedicated [`FormularyError`] variants, anything else to
    /// [`FormularyError::GitCommandError`] with stderr attached.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let git = get_git_command();
        let mut cmd = Command::new(&git);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.clone());
        cmd.args(&full_args);

        tracing::debug!(target: "git", "Executing: {} {}", git, full_args.join(" "));

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let operation = self.operation_name(&full_args);
        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result
                    .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {}s: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(FormularyError::GitCommandError {
                        operation,
                        stderr: format!(
                            "git command timed out after {} seconds",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(
                target: "git",
                "Command failed ({:?}): {}",
                output.status.code(),
                stderr.trim()
            );
            return Err(self.failure_error(&operation, stderr).into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}", stdout.trim());
        }

        Ok(GitCommandOutput { stdout, stderr })
    }

    /// Executes the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Executes the command, discarding output, keeping only success.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// The git subcommand name, skipping a leading `-C <dir>` pair.
    fn operation_name(&self, full_args: &[String]) -> String {
        let start = if full_args.first().map(String::as_str) == Some("-C") { 2 } else { 0 };
        full_args.get(start).cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn failure_error(&self, operation: &str, stderr: String) -> FormularyError {
        match operation {
            "clone" => FormularyError::GitCloneFailed {
                url: self.clone_url.clone().unwrap_or_else(|| "unknown".to_string()),
                reason: stderr,
            },
            "checkout" => {
                // args: checkout <ref> (after any -C pair was skipped)
                let reference = self
                    .args
                    .iter()
                    .skip_while(|a| a.as_str() != "checkout")
                    .nth(1)
                    .cloned()
                    .unwrap_or_default();
                FormularyError::GitCheckoutFailed {
                    reference,
                    reason: stderr,
                }
            }
            _ => FormularyError::GitCommandError {
                operation: operation.to_string(),
                stderr,
            },
        }
    }
}

/// Captured output of a git command.
#[derive(Debug)]
pub struct GitCommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error output.
    pub stderr: String,
}

// Convenience builders for the operations formulary performs.

impl GitCommand {
    /// `git clone <url> <target>`.
    pub fn clone_repo(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new()
            .arg("clone")
            .arg(url)
            .arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd.timeout_duration = Some(crate::constants::GIT_CLONE_TIMEOUT);
        cmd
    }

    /// `git fetch --all --tags --force`.
    pub fn fetch() -> Self {
        Self::new()
            .args(["fetch", "--all", "--tags", "--force"])
            .with_timeout(Some(crate::constants::GIT_FETCH_TIMEOUT))
    }

    /// `git checkout <ref>`.
    pub fn checkout(ref_name: &str) -> Self {
        Self::new().args(["checkout", ref_name])
    }

    /// `git reset --hard HEAD`.
    pub fn reset_hard() -> Self {
        Self::new().args(["reset", "--hard", "HEAD"])
    }

    /// `git rev-parse HEAD`.
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// `git rev-parse --verify <ref>` - succeeds iff the ref resolves
    /// locally.
    pub fn verify_ref(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", ref_name])
    }

    /// `git ls-remote <url> <patterns...>` - lists matching refs on the
    /// remote without cloning it.
    pub fn ls_remote<I, S>(url: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new()
            .arg("ls-remote")
            .arg(url)
            .args(patterns)
            .with_timeout(Some(crate::constants::GIT_LS_REMOTE_TIMEOUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn version_command_succeeds() {
        let output = GitCommand::new().arg("--version").execute().await.unwrap();
        assert!(output.stdout.contains("git version"));
    }

    #[tokio::test]
    async fn failed_command_maps_to_git_command_error() {
        let err = GitCommand::new()
            .args(["rev-parse", "--verify", "no-such-ref"])
            .current_dir(std::env::temp_dir())
            .execute()
            .await
            .unwrap_err();
        // temp dir is not a repo, so git fails; either way the error must
        // be a typed git failure, not a bare io error
        let formulary_err = err.downcast_ref::<FormularyError>().expect("typed error");
        assert!(matches!(formulary_err, FormularyError::GitCommandError { .. }));
    }

    #[test]
    fn operation_name_skips_working_dir_flag() {
        let cmd = GitCommand::new();
        let args: Vec<String> =
            ["-C", "/tmp/x", "fetch"].iter().map(ToString::to_string).collect();
        assert_eq!(cmd.operation_name(&args), "fetch");
        let args: Vec<String> = ["clone", "url"].iter().map(ToString::to_string).collect();
        assert_eq!(cmd.operation_name(&args), "clone");
    }
}
