//! Fetching: materializing a resolved artifact into a workspace.
//!
//! The fetcher is the only pipeline stage that touches the network. Given
//! an [`ArtifactRef`] it syncs the shared clone cache, checks out the
//! resolved revision, and copies the working tree (without `.git`) into a
//! scoped [`Workspace`]. The installer only ever sees plain files.
//!
//! Fetch is idempotent per `(url, revision)` for pinned refs: the same
//! revision always yields a byte-identical tree, served from the cache
//! with no network traffic once the commit is local. Head (branch) refs
//! carry no such guarantee; each resolve may point at a new head, and the
//! cache is re-synced for any commit it does not yet hold.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::cache::Cache;
use crate::core::FormularyError;
use crate::resolver::ArtifactRef;
use crate::utils::fs::copy_dir;

/// A disposable, per-install working directory.
///
/// One workspace exists per concurrent install attempt and is never
/// shared. Dropping it deletes everything beneath it, which is also the
/// cancellation story: an install abandoned mid-fetch leaves no partial
/// artifact behind for later stages to trip over.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh workspace under the system temp directory.
    pub fn new() -> Result<Self> {
        let dir = TempDir::with_prefix("formulary-ws-")?;
        Ok(Self { dir })
    }

    /// The workspace root path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Materializes `artifact` into `workspace` and returns the tree path.
///
/// Fails with [`FormularyError::FetchError`] wrapping the underlying
/// clone/fetch/checkout failure. Retries are the caller's concern; a
/// single call makes exactly one sync attempt.
pub async fn fetch(cache: &Cache, artifact: &ArtifactRef, workspace: &Workspace) -> Result<PathBuf> {
    let result = fetch_inner(cache, artifact, workspace).await;
    result.map_err(|e| {
        FormularyError::FetchError {
            url: artifact.url.clone(),
            reason: root_cause(&e),
        }
        .into()
    })
}

async fn fetch_inner(
    cache: &Cache,
    artifact: &ArtifactRef,
    workspace: &Workspace,
) -> Result<PathBuf> {
    let repo = cache.get_or_clone(&artifact.url, &artifact.revision).await?;
    repo.checkout(&artifact.revision).await?;

    let tree = workspace.path().join("source");
    copy_dir(repo.path(), &tree)?;
    tracing::debug!(
        target: "fetch",
        "Materialized {}@{} into {}",
        artifact.url,
        artifact.short_revision(),
        tree.display()
    );
    Ok(tree)
}

fn root_cause(error: &anyhow::Error) -> String {
    error.chain().last().map_or_else(|| error.to_string(), ToString::to_string)
}
