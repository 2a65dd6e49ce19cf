//! File locking for cache entries.
//!
//! Concurrent installs may share one clone cache; an OS-level exclusive
//! file lock per entry keeps clone/fetch/checkout sequences from
//! interleaving between processes. Locks release when the [`CacheLock`]
//! is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// An exclusive lock over one cache entry.
///
/// Lock files live in `<cache_dir>/.locks/<entry>.lock`. The lock is held
/// for as long as this value is alive.
pub struct CacheLock {
    _file: File,
}

impl CacheLock {
    /// Acquires an exclusive lock for `entry` under `cache_dir`, blocking
    /// until any other holder releases it.
    ///
    /// The blocking wait runs on the blocking thread pool so the async
    /// runtime is never stalled.
    pub async fn acquire(cache_dir: &Path, entry: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        std::fs::create_dir_all(&locks_dir)
            .with_context(|| format!("Failed to create locks directory: {}", locks_dir.display()))?;

        let lock_path = locks_dir.join(format!("{entry}.lock"));
        let path_for_task = lock_path.clone();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path_for_task)
                .with_context(|| {
                    format!("Failed to open lock file: {}", path_for_task.display())
                })?;
            file.lock_exclusive().with_context(|| {
                format!("Failed to acquire lock: {}", path_for_task.display())
            })?;
            Ok(file)
        })
        .await
        .context("Lock acquisition task panicked")??;

        tracing::trace!(target: "cache", "Acquired lock {}", lock_path.display());
        Ok(Self { _file: file })
    }
}
