//! Shared git clone cache.
//!
//! Every source URL gets one long-lived clone under the cache root; the
//! fetcher checks out revisions inside that clone and copies trees out of
//! it. Keeping clones around makes repeated installs of a pinned revision
//! idempotent and network-free: when the wanted commit is already present
//! locally, no remote is contacted.
//!
//! Cache entries are named `<owner>_<repo>-<hash>` where the hash is a
//! prefix of the SHA-256 of the full URL, so distinct URLs with the same
//! repository name never collide. Entry-level file locks (see [`lock`])
//! serialize concurrent access from parallel installs.

pub mod lock;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::git::{GitRepo, parse_git_url};
use crate::utils::fs::{dir_size, ensure_dir};
use lock::CacheLock;

/// Handle to the clone cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Opens (and lazily creates) a cache rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name for a URL's cache entry.
    pub fn entry_name(url: &str) -> String {
        let (owner, repo) = parse_git_url(url);
        let sanitize = |s: &str| -> String {
            s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' }).collect()
        };
        let digest = Sha256::digest(url.as_bytes());
        format!("{}_{}-{}", sanitize(&owner), sanitize(&repo), &hex::encode(digest)[..8])
    }

    /// Path of the clone directory for `url`.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.root.join(Self::entry_name(url))
    }

    /// Returns a clone of `url` containing `revision`, cloning or
    /// fetching as needed.
    ///
    /// The sync strategy keeps pinned installs offline-friendly:
    /// 1. no local clone → clone
    /// 2. revision already present locally → use as-is, no network
    /// 3. otherwise → fetch, after which checkout will find the revision
    ///    or fail
    ///
    /// The entry's file lock is held for the duration of the sync.
    pub async fn get_or_clone(&self, url: &str, revision: &str) -> Result<GitRepo> {
        ensure_dir(&self.root)?;
        let entry = Self::entry_name(url);
        let _lock = CacheLock::acquire(&self.root, &entry).await?;

        let path = self.entry_path(url);
        let repo = GitRepo::new(&path);

        if !repo.is_git_repo() {
            if path.exists() {
                // Half-written entry from an interrupted run.
                std::fs::remove_dir_all(&path).with_context(|| {
                    format!("Failed to clear stale cache entry: {}", path.display())
                })?;
            }
            tracing::debug!(target: "cache", "Cloning {url} into {entry}");
            return GitRepo::clone(url, &path).await;
        }

        if repo.has_commit(revision).await {
            tracing::debug!(target: "cache", "Cache hit for {url}@{revision}");
            return Ok(repo);
        }

        tracing::debug!(target: "cache", "Fetching {url} for {revision}");
        repo.fetch().await?;
        Ok(repo)
    }

    /// Total size of the cache in bytes.
    pub fn size(&self) -> Result<u64> {
        dir_size(&self.root)
    }

    /// Number of cached clones.
    pub fn entry_count(&self) -> Result<usize> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.file_name() != ".locks" {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Deletes the entire cache.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)
                .with_context(|| format!("Failed to clear cache: {}", self.root.display()))?;
        }
        Ok(())
    }
}
