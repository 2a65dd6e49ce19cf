//! Git operations for fetching package sources.
//!
//! Like Cargo, formulary shells out to the system git rather than linking
//! a git library: the user's credentials, proxies, and transports all work
//! unchanged. [`GitRepo`] is a thin handle over a local clone; the actual
//! command construction lives in [`command_builder::GitCommand`].

pub mod command_builder;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::FormularyError;
use command_builder::GitCommand;

/// Handle to a local git repository.
#[derive(Debug)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wraps an existing repository path without validating it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Clones `url` into `target` and returns a handle to the clone.
    pub async fn clone(url: &str, target: impl AsRef<Path>) -> Result<Self> {
        let target_path = target.as_ref();
        GitCommand::clone_repo(url, target_path).execute().await?;
        Ok(Self::new(target_path))
    }

    /// Fetches all branches and tags from the configured remote.
    pub async fn fetch(&self) -> Result<()> {
        GitCommand::fetch().current_dir(&self.path).execute_success().await
    }

    /// Checks out a branch, tag, or commit, resetting to a clean state
    /// first.
    ///
    /// Local modifications in the clone are discarded; cache clones only
    /// ever hold fetched content.
    pub async fn checkout(&self, ref_name: &str) -> Result<()> {
        // A failed reset is non-fatal (fresh clones with detached HEAD).
        let _ = GitCommand::reset_hard().current_dir(&self.path).execute().await;

        GitCommand::checkout(ref_name)
            .current_dir(&self.path)
            .execute_success()
            .await
            .map_err(|e| {
                if let Some(err) = e.downcast_ref::<FormularyError>() {
                    if matches!(err, FormularyError::GitCheckoutFailed { .. }) {
                        return e;
                    }
                }
                FormularyError::GitCheckoutFailed {
                    reference: ref_name.to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// The commit hash currently checked out.
    pub async fn current_commit(&self) -> Result<String> {
        GitCommand::current_commit().current_dir(&self.path).execute_stdout().await
    }

    /// Whether `revision` resolves to a commit already present locally.
    pub async fn has_commit(&self, revision: &str) -> bool {
        GitCommand::verify_ref(&format!("{revision}^{{commit}}"))
            .current_dir(&self.path)
            .execute()
            .await
            .is_ok()
    }

    /// Whether the path looks like a git repository.
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// The repository's local path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fails with [`FormularyError::GitNotFound`] when git is unavailable.
pub fn ensure_git_available() -> Result<()> {
    if !crate::utils::platform::is_git_installed() {
        return Err(FormularyError::GitNotFound.into());
    }
    Ok(())
}

/// Extracts `(owner, repo)` from a git URL.
///
/// Handles https, ssh (`git@host:owner/repo.git`), and `file://` forms;
/// URLs without an owner component yield `("local", <last segment>)`.
pub fn parse_git_url(url: &str) -> (String, String) {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");

    // ssh shorthand: git@host:owner/repo
    let path_part = if let Some((_, rest)) = trimmed.split_once(':') {
        if trimmed.starts_with("http") || trimmed.starts_with("file") {
            trimmed
        } else {
            rest
        }
    } else {
        trimmed
    };

    let segments: Vec<&str> = path_part
        .split('/')
        .filter(|s| !s.is_empty() && !s.contains("://") && !s.ends_with(':'))
        .collect();

    match segments.as_slice() {
        [] => ("local".to_string(), "repo".to_string()),
        [repo] => ("local".to_string(), (*repo).to_string()),
        [.., owner, repo] => ((*owner).to_string(), (*repo).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_https_url() {
        let (owner, repo) = parse_git_url("https://github.com/agzam/emacs-piper.git");
        assert_eq!(owner, "agzam");
        assert_eq!(repo, "emacs-piper");
    }

    #[test]
    fn parse_ssh_url() {
        let (owner, repo) = parse_git_url("git@github.com:agzam/emacs-piper.git");
        assert_eq!(owner, "agzam");
        assert_eq!(repo, "emacs-piper");
    }

    #[test]
    fn parse_file_url() {
        let (owner, repo) = parse_git_url("file:///tmp/fixtures/mxp-src");
        assert_eq!(repo, "mxp-src");
        assert_eq!(owner, "fixtures");
    }

    #[test]
    fn parse_bare_path() {
        let (owner, repo) = parse_git_url("file:///repo");
        assert_eq!(owner, "local");
        assert_eq!(repo, "repo");
    }

    #[tokio::test]
    async fn clone_and_inspect_local_repo() {
        use std::process::Command;
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let run = |args: &[&str], dir: &Path| {
            let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
            assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
        };
        run(&["init"], &src);
        run(&["config", "user.email", "test@example.com"], &src);
        run(&["config", "user.name", "Test"], &src);
        std::fs::write(src.join("file.txt"), "hello").unwrap();
        run(&["add", "."], &src);
        run(&["commit", "-m", "initial"], &src);

        let url = format!("file://{}", src.display());
        let clone_path = temp.path().join("clone");
        let repo = GitRepo::clone(&url, &clone_path).await.unwrap();

        assert!(repo.is_git_repo());
        let head = repo.current_commit().await.unwrap();
        assert_eq!(head.len(), 40);
        assert!(repo.has_commit(&head).await);
        assert!(!repo.has_commit("0000000000000000000000000000000000000000").await);
    }

    #[tokio::test]
    async fn clone_nonexistent_source_fails_typed() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = GitRepo::clone(
            "file:///definitely/not/a/repo-xyz",
            temp.path().join("clone"),
        )
        .await
        .unwrap_err();
        let typed = err.downcast_ref::<FormularyError>().expect("typed error");
        assert!(matches!(typed, FormularyError::GitCloneFailed { .. }));
    }
}
