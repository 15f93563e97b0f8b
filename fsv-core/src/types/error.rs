//! fsv error types.
//!
//! Every error carries an [`ErrorKind`] whose `error_type()` string is stable,
//! so scenario reports and the CLI's JSON output can be matched on reliably.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::diff::Mismatch;

/// Error kind enum for fsv operations.
#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// I/O failure, optionally tied to a path.
    #[error("io error{}: {message}", display_path(.path))]
    Io {
        path: Option<PathBuf>,
        message: String,
    },
    /// Root of a capture or a fixture does not exist.
    #[error("root not found: {}", .path.display())]
    RootNotFound { path: PathBuf },
    /// Non-regular, non-directory entry met under the `reject` policy.
    #[error("unsupported entry ({kind}): {}", .path.display())]
    UnsupportedEntry { path: PathBuf, kind: String },
    /// Exclusion pattern failed to compile.
    #[error("invalid exclusion pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    /// Archiver could not be spawned or exited unsuccessfully.
    #[error("archiver {operation} failed: {message}")]
    ArchiverInvocation { operation: String, message: String },
    /// Archiver ran past its deadline and was killed.
    #[error("archiver {operation} timed out after {after_secs}s")]
    ArchiverTimeout { operation: String, after_secs: u64 },
    /// Create finished but no new artifact appeared in the working directory.
    #[error("archiver produced no new artifact in {}", .workdir.display())]
    NoNewArtifact { workdir: PathBuf },
    /// A generation reference did not resolve.
    #[error("unknown generation: {reference}")]
    UnknownGeneration { reference: String },
    /// Artifacts matching the archiver's naming convention were already in
    /// the workspace when a scenario started.
    #[error("workspace {} already holds artifacts: {}", .workdir.display(), .names.join(", "))]
    PreexistingArtifacts { workdir: PathBuf, names: Vec<String> },
    /// A restore target already holds content.
    #[error("restore target is not empty: {}", .path.display())]
    RestoreTargetNotEmpty { path: PathBuf },
    /// Diff outcome did not match the scenario's expectation.
    #[error("assertion failed at step '{step}': {}", summarize(.mismatches))]
    AssertionFailure {
        step: String,
        mismatches: Vec<Mismatch>,
    },
    /// Number of generations did not match the scenario's expectation.
    #[error("assertion failed at step '{step}': expected {expected} generations, found {actual}")]
    GenerationCount {
        step: String,
        expected: usize,
        actual: usize,
    },
    /// Generation kinds did not match the scenario's expectation.
    #[error("assertion failed at step '{step}': expected generations [{expected}], found [{actual}]")]
    GenerationKinds {
        step: String,
        expected: String,
        actual: String,
    },
    /// Configuration error.
    #[error("config error: {message}")]
    Config { message: String },
    /// TOML parsing or serialization error.
    #[error("toml error: {message}")]
    Toml { message: String },
    /// JSON parsing or serialization error.
    #[error("json error: {message}")]
    Json { message: String },
    /// Fixture could not be reset.
    #[error("fixture error: {message}")]
    Fixture { message: String },
    /// Git operation error.
    #[error("git error: {message}")]
    Git { message: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" at {}", p.display()),
        None => String::new(),
    }
}

fn summarize(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ErrorKind {
    /// Get the error type as a stable string.
    pub fn error_type(&self) -> &'static str {
        match self {
            ErrorKind::Io { .. } => "io_error",
            ErrorKind::RootNotFound { .. } => "root_not_found",
            ErrorKind::UnsupportedEntry { .. } => "unsupported_entry",
            ErrorKind::InvalidPattern { .. } => "invalid_pattern",
            ErrorKind::ArchiverInvocation { .. } => "archiver_invocation",
            ErrorKind::ArchiverTimeout { .. } => "archiver_timeout",
            ErrorKind::NoNewArtifact { .. } => "no_new_artifact",
            ErrorKind::UnknownGeneration { .. } => "unknown_generation",
            ErrorKind::PreexistingArtifacts { .. } => "preexisting_artifacts",
            ErrorKind::RestoreTargetNotEmpty { .. } => "restore_target_not_empty",
            ErrorKind::AssertionFailure { .. } => "assertion_failure",
            ErrorKind::GenerationCount { .. } => "assertion_failure",
            ErrorKind::GenerationKinds { .. } => "assertion_failure",
            ErrorKind::Config { .. } => "config_error",
            ErrorKind::Toml { .. } => "toml_error",
            ErrorKind::Json { .. } => "json_error",
            ErrorKind::Fixture { .. } => "fixture_error",
            ErrorKind::Git { .. } => "git_error",
        }
    }
}

/// Main error type for fsv operations.
#[derive(Debug, Clone)]
pub struct FsvError(Box<ErrorKind>);

impl FsvError {
    /// Create a new error from an error kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Get the error type as a string.
    pub fn error_type(&self) -> &'static str {
        self.kind().error_type()
    }

    /// Create an I/O error tied to a path.
    pub fn io_at(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io {
            path: Some(path.into()),
            message: message.into(),
        })
    }

    /// Create a "root not found" error.
    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::RootNotFound { path: path.into() })
    }

    /// Create an "unsupported entry" error.
    pub fn unsupported_entry(path: impl Into<PathBuf>, kind: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedEntry {
            path: path.into(),
            kind: kind.into(),
        })
    }

    /// Create an "invalid pattern" error.
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        })
    }

    /// Create an archiver invocation error.
    pub fn archiver(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArchiverInvocation {
            operation: operation.into(),
            message: message.into(),
        })
    }

    /// Create an archiver timeout error.
    pub fn archiver_timeout(operation: impl Into<String>, after_secs: u64) -> Self {
        Self::new(ErrorKind::ArchiverTimeout {
            operation: operation.into(),
            after_secs,
        })
    }

    /// Create a "no new artifact" error.
    pub fn no_new_artifact(workdir: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::NoNewArtifact {
            workdir: workdir.into(),
        })
    }

    /// Create an "unknown generation" error.
    pub fn unknown_generation(reference: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownGeneration {
            reference: reference.into(),
        })
    }

    /// Create a "preexisting artifacts" error.
    pub fn preexisting_artifacts(workdir: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self::new(ErrorKind::PreexistingArtifacts {
            workdir: workdir.into(),
            names,
        })
    }

    /// Create a "restore target not empty" error.
    pub fn restore_target_not_empty(path: impl Into<PathBuf>) -> Self {
        Self::new(ErrorKind::RestoreTargetNotEmpty { path: path.into() })
    }

    /// Create an assertion failure listing every divergent classification.
    pub fn assertion(step: impl Into<String>, mismatches: Vec<Mismatch>) -> Self {
        Self::new(ErrorKind::AssertionFailure {
            step: step.into(),
            mismatches,
        })
    }

    /// Create a generation count assertion failure.
    pub fn generation_count(step: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::new(ErrorKind::GenerationCount {
            step: step.into(),
            expected,
            actual,
        })
    }

    /// Create an assertion failure for unexpected generation kinds.
    pub fn generation_kinds(
        step: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(ErrorKind::GenerationKinds {
            step: step.into(),
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    /// Create a "config error".
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config {
            message: message.into(),
        })
    }

    /// Create a "fixture error".
    pub fn fixture(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fixture {
            message: message.into(),
        })
    }

    /// Create a "git error".
    pub fn git(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Git {
            message: message.into(),
        })
    }

    /// Check if this is an assertion failure of any flavor.
    pub fn is_assertion_failure(&self) -> bool {
        self.error_type() == "assertion_failure"
    }

    /// Check if this error originated in the archiver.
    pub fn is_archiver_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ArchiverInvocation { .. }
                | ErrorKind::ArchiverTimeout { .. }
                | ErrorKind::NoNewArtifact { .. }
        )
    }

    /// Mismatches carried by an assertion failure, empty otherwise.
    pub fn mismatches(&self) -> &[Mismatch] {
        match self.kind() {
            ErrorKind::AssertionFailure { mismatches, .. } => mismatches,
            _ => &[],
        }
    }
}

impl fmt::Display for FsvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FsvError {}

impl From<ErrorKind> for FsvError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

// Conversion from common error types

impl From<std::io::Error> for FsvError {
    fn from(e: std::io::Error) -> Self {
        // fs-err already folds the path into the message
        Self::new(ErrorKind::Io {
            path: None,
            message: e.to_string(),
        })
    }
}

impl From<walkdir::Error> for FsvError {
    fn from(e: walkdir::Error) -> Self {
        Self::new(ErrorKind::Io {
            path: e.path().map(|p| p.to_path_buf()),
            message: e.to_string(),
        })
    }
}

impl From<serde_json::Error> for FsvError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Json {
            message: e.to_string(),
        })
    }
}

impl From<toml::de::Error> for FsvError {
    fn from(e: toml::de::Error) -> Self {
        Self::new(ErrorKind::Toml {
            message: e.to_string(),
        })
    }
}

impl From<toml::ser::Error> for FsvError {
    fn from(e: toml::ser::Error) -> Self {
        Self::new(ErrorKind::Toml {
            message: e.to_string(),
        })
    }
}
