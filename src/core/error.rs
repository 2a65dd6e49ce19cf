//! Error handling for formulary.
//!
//! The error system is built around two types:
//! - [`FormularyError`] - strongly-typed failure cases for every stage of
//!   the install pipeline, plus the ambient git/config/parse failures
//! - [`ErrorContext`] - a wrapper that adds a user-friendly message and an
//!   actionable suggestion for CLI display
//!
//! Each pipeline stage fails fast: an error halts the pipeline for that
//! package and is propagated to the caller with the failing stage attached
//! via `anyhow` context. Nothing is silently swallowed. The one deliberate
//! asymmetry is [`FormularyError::VerificationFailed`]: a failed
//! verification does not undo a completed install, it is reported as a
//! distinct terminal outcome.
//!
//! Use [`user_friendly_error`] at the CLI boundary to convert any
//! `anyhow::Error` into a colored, suggestion-bearing display.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for formulary operations.
///
/// Variants carry the details needed both for programmatic matching and
/// for rendering a useful message: URLs, reference names, stderr output,
/// expected-versus-actual verification text.
#[derive(Error, Debug)]
pub enum FormularyError {
    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "fetch", "ls-remote").
        operation: String,
        /// Error output from the git command.
        stderr: String,
    },

    /// Cloning a repository failed.
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The repository URL that could not be cloned.
        url: String,
        /// Why the clone failed.
        reason: String,
    },

    /// Checking out a reference failed.
    #[error("Failed to checkout reference '{reference}'")]
    GitCheckoutFailed {
        /// The branch, tag, or revision that could not be checked out.
        reference: String,
        /// Why the checkout failed.
        reason: String,
    },

    /// A formula's source location could not be resolved to a concrete
    /// revision: the URL is unreachable or the branch/tag does not exist.
    #[error("Cannot resolve source {url} at '{reference}'")]
    UnresolvableSource {
        /// The source repository URL.
        url: String,
        /// The branch, tag, or revision selector from the formula.
        reference: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Materializing a resolved artifact into a workspace failed.
    #[error("Failed to fetch {url}")]
    FetchError {
        /// The source repository URL.
        url: String,
        /// Why the fetch failed.
        reason: String,
    },

    /// A declared dependency is not installed.
    ///
    /// Raised by the installer before any filesystem write.
    #[error("Missing dependency '{dependency}' required by '{package}'")]
    MissingDependency {
        /// The package being installed.
        package: String,
        /// The dependency that could not be found.
        dependency: String,
    },

    /// Placing artifacts into the target layout failed.
    #[error("Failed to install '{package}': {reason}")]
    InstallError {
        /// The package being installed.
        package: String,
        /// Why installation failed.
        reason: String,
    },

    /// The installed artifact's test command did not produce the expected
    /// output. The package remains installed.
    #[error("Verification failed for '{package}'")]
    VerificationFailed {
        /// The package that failed verification.
        package: String,
        /// The pattern the formula expects in the command output.
        expected: String,
        /// The output the command actually produced.
        actual: String,
    },

    /// No formula file exists for the requested name.
    #[error("Formula '{name}' not found in {dir}")]
    FormulaNotFound {
        /// The requested package name.
        name: String,
        /// The formulae directory that was searched.
        dir: String,
    },

    /// A formula file exists but is not valid TOML.
    #[error("Invalid formula file syntax in {file}")]
    FormulaParseError {
        /// Path of the offending formula file.
        file: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A formula parsed but violates a structural invariant.
    #[error("Formula '{name}' is invalid: {reason}")]
    FormulaValidationError {
        /// The formula's package name (or file stem when the name field
        /// itself is at fault).
        name: String,
        /// The violated invariant.
        reason: String,
    },

    /// Global configuration problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong with the configuration.
        message: String,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error wrapper.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error wrapper.
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Semver parsing error wrapper.
    #[error("Semver parsing error: {0}")]
    SemverError(#[from] semver::Error),
}

/// A user-facing wrapper around an error, with optional details and a
/// suggestion for how to resolve it.
///
/// Built at the CLI boundary by [`user_friendly_error`]; commands deeper
/// in the stack propagate plain `anyhow::Error`s.
pub struct ErrorContext {
    /// The underlying error.
    pub error: anyhow::Error,
    /// Additional context about the failure.
    pub details: Option<String>,
    /// An actionable hint for the user.
    pub suggestion: Option<String>,
}

impl ErrorContext {
    /// Wraps an error with no details or suggestion.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            details: None,
            suggestion: None,
        }
    }

    /// Attaches explanatory details shown below the error message.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches an actionable suggestion shown below the error message.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Prints the error to stderr with color.
    pub fn display(&self) {
        eprintln!("{} {}", "Error:".red().bold(), self.error);

        // anyhow context frames, most recent first
        for cause in self.error.chain().skip(1) {
            eprintln!("  {} {}", "Caused by:".yellow(), cause);
        }

        if let Some(details) = &self.details {
            eprintln!("\n{details}");
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("\n{} {}", "Suggestion:".green().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n{details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Converts any error into an [`ErrorContext`] with a variant-appropriate
/// suggestion.
///
/// Downcasts to [`FormularyError`] where possible; unknown error types
/// pass through with no suggestion attached.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let (details, suggestion) = match error.downcast_ref::<FormularyError>() {
        Some(FormularyError::GitNotFound) => (
            None,
            Some("Install git from https://git-scm.com and ensure it is in PATH".to_string()),
        ),
        Some(FormularyError::UnresolvableSource { reference, .. }) => (
            None,
            Some(format!(
                "Check that the repository URL is reachable and that '{reference}' exists \
                 (git ls-remote <url> will list available refs)"
            )),
        ),
        Some(FormularyError::FetchError { .. }) => (
            None,
            Some("Check your network connection and repository access, then retry".to_string()),
        ),
        Some(FormularyError::MissingDependency { dependency, .. }) => (
            None,
            Some(format!(
                "Install '{dependency}' first (it must be on PATH or in the bin directory)"
            )),
        ),
        Some(FormularyError::InstallError { .. }) => (
            None,
            Some("Check permissions and free space on the target prefix, then retry".to_string()),
        ),
        Some(FormularyError::VerificationFailed { expected, actual, .. }) => (
            Some(format!(
                "Expected output matching: {expected}\nActual output:\n{actual}",
                actual = if actual.is_empty() { "(empty)" } else { actual }
            )),
            Some("The package remains installed; inspect the binary manually".to_string()),
        ),
        Some(FormularyError::FormulaNotFound { dir, .. }) => {
            (None, Some(format!("Add a <name>.toml formula under {dir}")))
        }
        Some(FormularyError::FormulaParseError { file, .. }) => {
            (None, Some(format!("Fix the TOML syntax in {file}")))
        }
        Some(FormularyError::FormulaValidationError { .. }) => (
            None,
            Some(
                "A formula needs a semver version, exactly one of branch/tag/rev, and at \
                 least one [install] bin entry"
                    .to_string(),
            ),
        ),
        Some(FormularyError::ConfigError { .. }) => (
            None,
            Some("Check ~/.formulary/config.toml (or $FORMULARY_CONFIG)".to_string()),
        ),
        _ => (None, None),
    };

    let mut context = ErrorContext::new(error);
    if let Some(details) = details {
        context = context.with_details(details);
    }
    if let Some(suggestion) = suggestion {
        context = context.with_suggestion(suggestion);
    }
    context
}
