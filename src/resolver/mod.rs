//! Source resolution: formula selector → concrete revision.
//!
//! Resolution turns a formula's source location (URL + branch/tag/rev
//! selector) into an [`ArtifactRef`] holding the exact commit the rest of
//! the pipeline will fetch and install. All resolution happens up front so
//! fetch, install, and verify operate on a fixed revision; nothing after
//! this stage consults the remote's refs again.
//!
//! A branch selector resolves to the branch's current head and is marked
//! unpinned: repeating the install later may legitimately produce a
//! different artifact. Tags and explicit revisions are pinned and
//! reproducible.

use anyhow::Result;

use crate::core::FormularyError;
use crate::formula::Formula;
use crate::git::command_builder::GitCommand;

/// A resolved, concrete pointer to fetchable source content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// The source repository URL, verbatim from the formula.
    pub url: String,
    /// The exact commit to fetch.
    pub revision: String,
    /// Whether the revision is reproducible (tag/rev) or a moving branch
    /// head.
    pub pinned: bool,
}

impl ArtifactRef {
    /// Short revision form for display.
    pub fn short_revision(&self) -> &str {
        &self.revision[..self.revision.len().min(12)]
    }
}

/// Resolves a formula's source to a concrete [`ArtifactRef`].
///
/// - `branch` → `git ls-remote` for the branch head, `pinned: false`
/// - `tag` → `git ls-remote` for the tag (peeled commit preferred),
///   `pinned: true`
/// - `rev` → taken verbatim with no network round-trip, `pinned: true`
///
/// Fails with [`FormularyError::UnresolvableSource`] when the repository
/// is unreachable or the selector names a ref that does not exist.
pub async fn resolve(formula: &Formula) -> Result<ArtifactRef> {
    let url = formula.source.url.clone();

    if let Some(rev) = &formula.source.rev {
        // Already concrete; existence is established at fetch time.
        return Ok(ArtifactRef {
            url,
            revision: rev.to_lowercase(),
            pinned: true,
        });
    }

    if let Some(tag) = &formula.source.tag {
        let revision =
            ls_remote_revision(&url, tag, &[format!("refs/tags/{tag}"), format!("refs/tags/{tag}^{{}}")])
                .await?;
        return Ok(ArtifactRef {
            url,
            revision,
            pinned: true,
        });
    }

    let branch = formula.source.branch.as_deref().unwrap_or_default();
    let revision =
        ls_remote_revision(&url, branch, &[format!("refs/heads/{branch}")]).await?;
    Ok(ArtifactRef {
        url,
        revision,
        pinned: false,
    })
}

/// Queries the remote for `patterns` and returns the commit they resolve
/// to.
///
/// For annotated tags both the tag object and its peeled `^{}` entry are
/// requested; the peeled commit wins when present.
async fn ls_remote_revision(url: &str, reference: &str, patterns: &[String]) -> Result<String> {
    let output = GitCommand::ls_remote(url, patterns.iter().cloned())
        .execute()
        .await
        .map_err(|e| FormularyError::UnresolvableSource {
            url: url.to_string(),
            reference: reference.to_string(),
            reason: root_cause(&e),
        })?;

    let mut plain: Option<String> = None;
    let mut peeled: Option<String> = None;
    for line in output.stdout.lines() {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if name.ends_with("^{}") {
            peeled = Some(hash.to_string());
        } else {
            plain = Some(hash.to_string());
        }
    }

    peeled.or(plain).ok_or_else(|| {
        FormularyError::UnresolvableSource {
            url: url.to_string(),
            reference: reference.to_string(),
            reason: "reference does not exist on the remote".to_string(),
        }
        .into()
    })
}

fn root_cause(error: &anyhow::Error) -> String {
    error.chain().last().map_or_else(|| error.to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{InstallSpec, SourceSpec};
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    fn run_git(args: &[&str], dir: &Path) {
        let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
    }

    /// Local fixture repo with one commit and one annotated tag; returns
    /// (tempdir, url, head sha, branch name).
    fn fixture_repo() -> (TempDir, String, String, String) {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&["init"], &repo);
        run_git(&["config", "user.email", "test@example.com"], &repo);
        run_git(&["config", "user.name", "Test"], &repo);
        std::fs::write(repo.join("mxp"), "#!/bin/sh\necho 'mxp v0.4.0'\n").unwrap();
        run_git(&["add", "."], &repo);
        run_git(&["commit", "-m", "initial"], &repo);
        run_git(&["tag", "-a", "v0.4.0", "-m", "release"], &repo);

        let head = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&repo)
            .output()
            .unwrap();
        let head = String::from_utf8_lossy(&head.stdout).trim().to_string();

        let branch = Command::new("git")
            .args(["branch", "--show-current"])
            .current_dir(&repo)
            .output()
            .unwrap();
        let branch = String::from_utf8_lossy(&branch.stdout).trim().to_string();

        let url = format!("file://{}", repo.display());
        (temp, url, head, branch)
    }

    fn formula_with_source(url: &str, source: SourceSpec) -> Formula {
        Formula {
            name: "mxp".to_string(),
            description: "test".to_string(),
            homepage: None,
            version: "0.4.0".to_string(),
            license: None,
            dependencies: vec![],
            caveats: None,
            source: SourceSpec {
                url: url.to_string(),
                ..source
            },
            install: InstallSpec {
                bin: vec!["mxp".to_string()],
            },
            test: None,
        }
    }

    #[tokio::test]
    async fn branch_resolves_to_head_unpinned() {
        let (_temp, url, head, branch) = fixture_repo();
        let formula = formula_with_source(
            &url,
            SourceSpec {
                url: String::new(),
                branch: Some(branch),
                tag: None,
                rev: None,
            },
        );

        let artifact = resolve(&formula).await.unwrap();
        assert_eq!(artifact.revision, head);
        assert!(!artifact.pinned);
    }

    #[tokio::test]
    async fn annotated_tag_resolves_to_peeled_commit() {
        let (_temp, url, head, _branch) = fixture_repo();
        let formula = formula_with_source(
            &url,
            SourceSpec {
                url: String::new(),
                branch: None,
                tag: Some("v0.4.0".to_string()),
                rev: None,
            },
        );

        let artifact = resolve(&formula).await.unwrap();
        // The annotated tag object hash differs from the commit; the
        // peeled entry must win.
        assert_eq!(artifact.revision, head);
        assert!(artifact.pinned);
    }

    #[tokio::test]
    async fn rev_passes_through_without_network() {
        let formula = formula_with_source(
            "file:///nowhere/at/all",
            SourceSpec {
                url: String::new(),
                branch: None,
                tag: None,
                rev: Some("0123456789ABCDEF0123456789abcdef01234567".to_string()),
            },
        );

        let artifact = resolve(&formula).await.unwrap();
        assert_eq!(artifact.revision, "0123456789abcdef0123456789abcdef01234567");
        assert!(artifact.pinned);
        assert_eq!(artifact.short_revision(), "0123456789ab");
    }

    #[tokio::test]
    async fn missing_branch_is_unresolvable() {
        let (_temp, url, _head, _branch) = fixture_repo();
        let formula = formula_with_source(
            &url,
            SourceSpec {
                url: String::new(),
                branch: Some("does-not-exist".to_string()),
                tag: None,
                rev: None,
            },
        );

        let err = resolve(&formula).await.unwrap_err();
        let typed = err.downcast_ref::<FormularyError>().unwrap();
        assert!(matches!(typed, FormularyError::UnresolvableSource { .. }));
    }

    #[tokio::test]
    async fn unreachable_url_is_unresolvable() {
        let formula = formula_with_source(
            "file:///definitely/not/a/repository",
            SourceSpec {
                url: String::new(),
                branch: Some("main".to_string()),
                tag: None,
                rev: None,
            },
        );

        let err = resolve(&formula).await.unwrap_err();
        let typed = err.downcast_ref::<FormularyError>().unwrap();
        assert!(matches!(typed, FormularyError::UnresolvableSource { .. }));
    }
}
