//! The per-package install pipeline.
//!
//! One package moves through four stages in order - resolve, fetch,
//! install, verify - with no branching back. Each stage consumes the
//! previous stage's output, so the pipeline is inherently sequential;
//! concurrency across packages is the CLI's concern, with one workspace
//! per package and nothing shared but the (internally locked) clone
//! cache.
//!
//! Failure semantics: any stage error halts the pipeline for that package
//! and is wrapped with the failing stage's name. The fetch stage is
//! retried a fixed number of times with exponential backoff; nothing else
//! retries. Verification is special-cased: its failure is recorded in the
//! report rather than propagated, because a package that installs but
//! fails its smoke test remains installed.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cache::Cache;
use crate::constants::{FETCH_ATTEMPTS, backoff_with_delay};
use crate::core::{FormularyError, Stage};
use crate::fetcher::{self, Workspace};
use crate::formula::Formula;
use crate::installer::{self, TargetLayout};
use crate::resolver::{self, ArtifactRef};
use crate::verifier::{self, VerifyOutcome};

/// What happened to one package, through all four stages.
#[derive(Debug)]
pub struct InstallReport {
    /// Package name.
    pub name: String,
    /// Package version from the formula.
    pub version: String,
    /// The resolved artifact the install was built from.
    pub artifact: ArtifactRef,
    /// Final paths of the installed artifacts.
    pub installed: Vec<PathBuf>,
    /// How verification ended.
    pub verification: VerificationResult,
}

/// Terminal verification state for an installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Output matched the formula's expectation.
    Passed,
    /// The command ran but its output did not match. The package remains
    /// installed.
    Failed {
        /// Pattern the formula expects.
        expected: String,
        /// Output the command produced.
        actual: String,
    },
    /// The formula declares no test.
    Skipped,
}

impl InstallReport {
    /// Whether the package completed the full pipeline, verification
    /// included.
    pub fn is_success(&self) -> bool {
        !matches!(self.verification, VerificationResult::Failed { .. })
    }
}

/// Runs the full pipeline for one formula.
///
/// Returns `Ok` with the report even when verification fails (the install
/// itself succeeded); every other stage error propagates, wrapped with
/// the stage name.
pub async fn install_formula(
    formula: &Formula,
    cache: &Cache,
    layout: &TargetLayout,
) -> Result<InstallReport> {
    let artifact = resolver::resolve(formula)
        .await
        .with_context(|| stage_context(Stage::Resolve, &formula.name))?;
    tracing::info!(
        target: "pipeline",
        "Resolved {} to {} ({})",
        formula.name,
        artifact.short_revision(),
        if artifact.pinned { "pinned" } else { "head" }
    );

    let workspace = Workspace::new().with_context(|| stage_context(Stage::Fetch, &formula.name))?;
    let tree = fetch_with_retry(cache, &artifact, &workspace)
        .await
        .with_context(|| stage_context(Stage::Fetch, &formula.name))?;

    let outcome = installer::install(&tree, formula, layout)
        .await
        .with_context(|| stage_context(Stage::Install, &formula.name))?;

    let verification = match verifier::verify(formula, layout).await {
        Ok(VerifyOutcome::Passed { .. }) => VerificationResult::Passed,
        Ok(VerifyOutcome::Skipped) => VerificationResult::Skipped,
        Err(e) => match e.downcast_ref::<FormularyError>() {
            Some(FormularyError::VerificationFailed { expected, actual, .. }) => {
                VerificationResult::Failed {
                    expected: expected.clone(),
                    actual: actual.clone(),
                }
            }
            _ => return Err(e.context(stage_context(Stage::Verify, &formula.name))),
        },
    };

    Ok(InstallReport {
        name: formula.name.clone(),
        version: formula.version.clone(),
        artifact,
        installed: outcome.installed,
        verification,
    })
}

/// Fetches with bounded retries and exponential backoff.
///
/// The retry policy lives here, in the caller, not in the fetcher: one
/// fetch call makes one attempt.
async fn fetch_with_retry(
    cache: &Cache,
    artifact: &ArtifactRef,
    workspace: &Workspace,
) -> Result<PathBuf> {
    let mut attempt = 0u32;
    loop {
        match fetcher::fetch(cache, artifact, workspace).await {
            Ok(tree) => return Ok(tree),
            Err(e) if attempt + 1 < FETCH_ATTEMPTS => {
                tracing::warn!(
                    target: "pipeline",
                    "Fetch attempt {} of {FETCH_ATTEMPTS} failed for {}: {e}",
                    attempt + 1,
                    artifact.url
                );
                attempt = backoff_with_delay(attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn stage_context(stage: Stage, package: &str) -> String {
    format!("{stage} stage failed for '{package}'")
}
