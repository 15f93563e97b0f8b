//! Exclusion pattern language.
//!
//! Two pattern shapes are supported:
//! - A pattern containing `/` is matched against the whole relative path.
//!   `*` and `?` never cross a `/`, so `*/a.txt` matches `test_data/a.txt`
//!   but not `test_data/abc/a.txt`.
//! - A pattern without `/` is matched against the basename of every entry,
//!   at any depth (`*something.txt`).
//!
//! An excluded directory excludes everything below it.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::FsvError;

/// Compiled set of exclusion patterns.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    by_path: GlobSet,
    by_name: GlobSet,
}

impl ExclusionSet {
    /// Compile a set of patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, FsvError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_path = GlobSetBuilder::new();
        let mut by_name = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let normalized = pattern.strip_prefix("./").unwrap_or(pattern);
            let glob = GlobBuilder::new(normalized)
                .literal_separator(true)
                .build()
                .map_err(|e| FsvError::invalid_pattern(pattern, e.to_string()))?;

            if normalized.contains('/') {
                by_path.add(glob);
            } else {
                by_name.add(glob);
            }
            kept.push(pattern.to_string());
        }

        let by_path = by_path
            .build()
            .map_err(|e| FsvError::invalid_pattern(kept.join(","), e.to_string()))?;
        let by_name = by_name
            .build()
            .map_err(|e| FsvError::invalid_pattern(kept.join(","), e.to_string()))?;

        Ok(Self {
            patterns: kept,
            by_path,
            by_name,
        })
    }

    /// Validate patterns without keeping the compiled set.
    pub fn check<I, S>(patterns: I) -> Result<(), FsvError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(patterns).map(|_| ())
    }

    /// A set that excludes nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            by_path: GlobSet::empty(),
            by_name: GlobSet::empty(),
        }
    }

    /// The source patterns, in the order given.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether the entry at `rel` matches a pattern itself.
    pub fn matches_entry(&self, rel: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.by_path.is_match(rel) {
            return true;
        }
        rel.file_name()
            .is_some_and(|name| self.by_name.is_match(Path::new(name)))
    }

    /// Whether `rel` or any of its ancestors matches a pattern.
    pub fn is_excluded(&self, rel: &Path) -> bool {
        rel.ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .any(|a| self.matches_entry(a))
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::empty()
    }
}
