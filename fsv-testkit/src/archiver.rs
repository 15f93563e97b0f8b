//! Archiver abstraction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use fsv_core::FsvError;

/// Create-mode request.
#[derive(Debug, Clone)]
pub struct CreateRequest<'a> {
    /// Directory the archiver writes its artifact into.
    pub workdir: &'a Path,
    /// Source paths, relative to `workdir`.
    pub sources: &'a [PathBuf],
    /// Exclusion patterns, passed through verbatim.
    pub excludes: &'a [String],
    /// Skip delta encoding and write a self-contained archive.
    pub force_full: bool,
}

/// Restore-mode request.
#[derive(Debug, Clone)]
pub struct RestoreRequest<'a> {
    /// Directory the artifact lives in.
    pub workdir: &'a Path,
    /// Artifact file name.
    pub artifact: &'a str,
    /// Destination directory, already created and empty.
    pub dest: &'a Path,
}

/// Outcome of one archiver invocation.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Process exit code, `-1` when killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Invocation {
    /// A successful in-process invocation.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Narrow interface over an archiver under test.
pub trait Archiver {
    /// Human-readable name for logs and reports.
    fn name(&self) -> &str;

    /// How this archiver names its artifacts.
    fn convention(&self) -> &ArtifactConvention;

    /// Produce one new artifact in `request.workdir`.
    fn create(&self, request: &CreateRequest<'_>) -> Result<Invocation, FsvError>;

    /// Extract an artifact into `request.dest`.
    fn restore(&self, request: &RestoreRequest<'_>) -> Result<Invocation, FsvError>;
}

/// Artifact naming convention: `<prefix><unix seconds><suffix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactConvention {
    pub prefix: String,
    pub suffix: String,
}

impl ArtifactConvention {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Build the artifact name for a timestamp.
    pub fn name_for(&self, unix_secs: i64) -> String {
        format!("{}{}{}", self.prefix, unix_secs, self.suffix)
    }

    /// Check whether a file name follows the convention.
    pub fn matches(&self, name: &str) -> bool {
        name.len() > self.prefix.len() + self.suffix.len()
            && name.starts_with(&self.prefix)
            && name.ends_with(&self.suffix)
    }

    /// Numeric timestamp embedded in a matching name.
    pub fn timestamp(&self, name: &str) -> Option<u64> {
        if !self.matches(name) {
            return None;
        }
        name[self.prefix.len()..name.len() - self.suffix.len()]
            .parse()
            .ok()
    }

    /// Sort names oldest first.
    ///
    /// Names with a numeric timestamp are ordered by it; the rest sort
    /// lexicographically ahead of them.
    pub fn sort(&self, names: &mut [String]) {
        names.sort_by(|a, b| {
            (self.timestamp(a), a.as_str()).cmp(&(self.timestamp(b), b.as_str()))
        });
    }

    /// List matching artifacts in `dir`, oldest first.
    pub fn list(&self, dir: &Path) -> Result<Vec<String>, FsvError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.matches(name) {
                    names.push(name.to_string());
                }
            }
        }
        self.sort(&mut names);
        Ok(names)
    }

    /// Newest matching artifact in `dir`.
    pub fn newest(&self, dir: &Path) -> Result<Option<String>, FsvError> {
        Ok(self.list(dir)?.pop())
    }
}
