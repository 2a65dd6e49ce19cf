//! File system utilities used by the fetcher, installer, and cache.
//!
//! All helpers return `anyhow::Result` with path context attached, so
//! callers can propagate with `?` and still produce actionable messages.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Creates a directory and all parent directories if they don't exist.
///
/// Succeeds silently when the directory is already present.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Recursively copies a directory tree, skipping any `.git` directories.
///
/// Permissions are preserved by `std::fs::copy`, so executable bits on
/// fetched artifacts survive the copy.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in WalkDir::new(src).min_depth(1).into_iter().filter_entry(|e| {
        e.file_name().to_str() != Some(".git")
    }) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Failed to relativize {}", entry.path().display()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
        // Symlinks inside fetched trees are skipped rather than followed.
    }

    Ok(())
}

/// Total size in bytes of all files under `path`.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut size = 0u64;
    if !path.exists() {
        return Ok(0);
    }
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        if entry.file_type().is_file() {
            size += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(size)
}

/// SHA-256 checksum over a directory tree: file paths and contents, in
/// sorted order, `.git` excluded.
///
/// Two trees with identical relative paths and identical file bytes hash
/// identically, which is the property fetch idempotence is checked
/// against.
pub fn tree_checksum(root: &Path) -> Result<String> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str() != Some(".git"))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    let mut hasher = Sha256::new();
    for file in &files {
        let relative = file.strip_prefix(root).unwrap_or(file);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        let contents = fs::read(file)
            .with_context(|| format!("Failed to read file for checksum: {}", file.display()))?;
        hasher.update(&contents);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Marks a file as executable for owner, group, and other.
///
/// No-op on platforms without Unix permission bits.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Whether the file at `path` is executable by the current user.
///
/// On platforms without Unix permission bits this only checks existence.
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
