//! Verification: running a formula's test command against the installed
//! layout.
//!
//! Verification is advisory. It runs after install, under a deadline, and
//! a failure never rolls the install back - the caller reports the
//! package as installed-but-failing. The test command is a template
//! (`{bin}`, `{name}`, `{version}`) so formulas stay independent of the
//! prefix they are installed into.

use anyhow::Result;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::VERIFY_TIMEOUT;
use crate::core::FormularyError;
use crate::formula::Formula;
use crate::installer::TargetLayout;

/// Result of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The test command ran and its output matched.
    Passed {
        /// The matched command output.
        output: String,
    },
    /// The formula declares no test.
    Skipped,
}

/// Runs the formula's test command and checks its output.
///
/// The rendered command's combined stdout and stderr are matched against
/// the formula's `expect` pattern - as a regex when it compiles, as a
/// literal substring otherwise. Fails with
/// [`FormularyError::VerificationFailed`] carrying expected and actual
/// output; command spawn failures and timeouts are verification failures
/// too, with the failure text standing in for the output.
pub async fn verify(formula: &Formula, layout: &TargetLayout) -> Result<VerifyOutcome> {
    let Some(test) = &formula.test else {
        tracing::debug!(target: "verify", "No test declared for {}", formula.name);
        return Ok(VerifyOutcome::Skipped);
    };

    let rendered = render_command(&test.command, formula, layout);
    let argv = shell_words::split(&rendered).map_err(|e| FormularyError::VerificationFailed {
        package: formula.name.clone(),
        expected: test.expect.clone(),
        actual: format!("invalid test command '{rendered}': {e}"),
    })?;
    let Some((program, args)) = argv.split_first() else {
        return Err(FormularyError::VerificationFailed {
            package: formula.name.clone(),
            expected: test.expect.clone(),
            actual: "empty test command".to_string(),
        }
        .into());
    };

    tracing::debug!(target: "verify", "Running test command: {rendered}");

    let fail = |actual: String| -> anyhow::Error {
        FormularyError::VerificationFailed {
            package: formula.name.clone(),
            expected: test.expect.clone(),
            actual,
        }
        .into()
    };

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let output = match timeout(VERIFY_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(fail(format!("failed to run '{program}': {e}"))),
        Err(_) => {
            return Err(fail(format!(
                "test command timed out after {} seconds",
                VERIFY_TIMEOUT.as_secs()
            )));
        }
    };

    let mut actual = String::from_utf8_lossy(&output.stdout).to_string();
    actual.push_str(&String::from_utf8_lossy(&output.stderr));
    let actual = actual.trim().to_string();

    if !output.status.success() {
        return Err(fail(format!(
            "command exited with {}: {actual}",
            output.status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
        )));
    }

    if output_matches(&test.expect, &actual) {
        Ok(VerifyOutcome::Passed { output: actual })
    } else {
        Err(fail(actual))
    }
}

/// Expands the `{bin}`, `{name}`, and `{version}` placeholders.
fn render_command(template: &str, formula: &Formula, layout: &TargetLayout) -> String {
    template
        .replace("{bin}", &layout.bin_dir().display().to_string())
        .replace("{name}", &formula.name)
        .replace("{version}", &formula.version)
}

/// Regex match when the pattern compiles, literal substring otherwise.
fn output_matches(expect: &str, actual: &str) -> bool {
    match regex::Regex::new(expect) {
        Ok(re) => re.is_match(actual),
        Err(_) => actual.contains(expect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{InstallSpec, SourceSpec, TestSpec};
    use crate::utils::fs::make_executable;
    use tempfile::TempDir;

    fn formula_with_test(test: Option<TestSpec>) -> Formula {
        Formula {
            name: "mxp".to_string(),
            description: "test".to_string(),
            homepage: None,
            version: "0.4.0".to_string(),
            license: None,
            dependencies: vec![],
            caveats: None,
            source: SourceSpec {
                url: "file:///unused".to_string(),
                branch: Some("main".to_string()),
                tag: None,
                rev: None,
            },
            install: InstallSpec {
                bin: vec!["mxp".to_string()],
            },
            test,
        }
    }

    #[cfg(unix)]
    fn install_script(layout: &TargetLayout, name: &str, body: &str) {
        std::fs::create_dir_all(layout.bin_dir()).unwrap();
        let path = layout.bin_dir().join(name);
        std::fs::write(&path, body).unwrap();
        make_executable(&path).unwrap();
    }

    #[tokio::test]
    async fn skips_when_no_test_declared() {
        let temp = TempDir::new().unwrap();
        let layout = TargetLayout::new(temp.path());
        let outcome = verify(&formula_with_test(None), &layout).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Skipped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_when_output_contains_expected() {
        let temp = TempDir::new().unwrap();
        let layout = TargetLayout::new(temp.path());
        install_script(&layout, "mxp", "#!/bin/sh\necho 'mxp v0.4.0'\n");

        let formula = formula_with_test(Some(TestSpec {
            command: "{bin}/mxp --version".to_string(),
            expect: "mxp v0.4.0".to_string(),
        }));

        match verify(&formula, &layout).await.unwrap() {
            VerifyOutcome::Passed { output } => assert!(output.contains("mxp v0.4.0")),
            other => panic!("expected pass, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fails_with_expected_and_actual_on_mismatch() {
        let temp = TempDir::new().unwrap();
        let layout = TargetLayout::new(temp.path());
        install_script(&layout, "mxp", "#!/bin/sh\necho 'mxp v0.3.9'\n");

        let formula = formula_with_test(Some(TestSpec {
            command: "{bin}/mxp --version".to_string(),
            expect: "mxp v0.4.0".to_string(),
        }));

        let err = verify(&formula, &layout).await.unwrap_err();
        match err.downcast_ref::<FormularyError>().unwrap() {
            FormularyError::VerificationFailed { expected, actual, .. } => {
                assert_eq!(expected, "mxp v0.4.0");
                assert!(actual.contains("mxp v0.3.9"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_verification_failure() {
        let temp = TempDir::new().unwrap();
        let layout = TargetLayout::new(temp.path());

        let formula = formula_with_test(Some(TestSpec {
            command: "{bin}/mxp --version".to_string(),
            expect: "mxp v0.4.0".to_string(),
        }));

        let err = verify(&formula, &layout).await.unwrap_err();
        let typed = err.downcast_ref::<FormularyError>().unwrap();
        assert!(matches!(typed, FormularyError::VerificationFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_verification_failure() {
        let temp = TempDir::new().unwrap();
        let layout = TargetLayout::new(temp.path());
        install_script(&layout, "mxp", "#!/bin/sh\necho 'mxp v0.4.0'\nexit 3\n");

        let formula = formula_with_test(Some(TestSpec {
            command: "{bin}/mxp --version".to_string(),
            expect: "mxp v0.4.0".to_string(),
        }));

        let err = verify(&formula, &layout).await.unwrap_err();
        match err.downcast_ref::<FormularyError>().unwrap() {
            FormularyError::VerificationFailed { actual, .. } => {
                assert!(actual.contains("exited with 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn template_expands_all_placeholders() {
        let layout = TargetLayout::new("/opt/fm");
        let formula = formula_with_test(None);
        let rendered = render_command("{bin}/{name} --version {version}", &formula, &layout);
        assert_eq!(rendered, "/opt/fm/bin/mxp --version 0.4.0");
    }

    #[test]
    fn matcher_supports_regex_and_substring() {
        assert!(output_matches("mxp v0\\.4\\.\\d+", "mxp v0.4.0"));
        assert!(output_matches("mxp v0.4.0", "prefix mxp v0.4.0 suffix"));
        // An invalid regex falls back to substring semantics.
        assert!(output_matches("v0.4.0 (", "found v0.4.0 ( here"));
        assert!(!output_matches("mxp v9.9.9", "mxp v0.4.0"));
    }
}
