//! Platform detection helpers.
//!
//! Locating the git executable and naming binaries are the only two places
//! formulary needs to care about the host platform; both live here.

use std::path::PathBuf;

/// Name of the git executable to invoke.
///
/// `which` consults PATH and, on Windows, the common installation
/// locations; the plain command name is returned as a fallback so the
/// subprocess layer can produce its own "git not found" error.
pub fn get_git_command() -> String {
    which::which("git")
        .map_or_else(|_| "git".to_string(), |p| p.display().to_string())
}

/// Whether a git executable is available.
pub fn is_git_installed() -> bool {
    which::which("git").is_ok()
}

/// Looks up an executable by name on PATH.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_on_path_locates_a_shell() {
        #[cfg(unix)]
        assert!(find_on_path("sh").is_some());
        assert!(find_on_path("definitely-not-a-real-binary-42").is_none());
    }
}
