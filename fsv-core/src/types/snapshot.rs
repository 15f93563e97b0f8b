//! Snapshot of a file tree.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::helpers::hash::HashAlgo;

/// Observable state of a file tree at one instant.
///
/// Keys are normalized relative paths, so snapshots taken under different
/// physical roots compare structurally. A path lives in at most one of
/// `files`, `dirs` and `specials`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// Algorithm that produced the fingerprints.
    pub algo: HashAlgo,

    /// Regular files: relative path -> content fingerprint.
    pub files: BTreeMap<PathBuf, String>,

    /// Directories, including the captured root.
    pub dirs: BTreeSet<PathBuf>,

    /// Entries that are neither files nor directories (`record` policy only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specials: BTreeMap<PathBuf, SpecialKind>,
}

/// Kind of a non-regular, non-directory entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpecialKind {
    /// Symbolic link, never followed.
    Symlink { target: PathBuf },
    /// Named pipe.
    Fifo,
    /// Unix domain socket.
    Socket,
    /// Block device node.
    BlockDevice,
    /// Character device node.
    CharDevice,
    /// Anything the platform reports that is none of the above.
    Unknown,
}

impl SpecialKind {
    /// Short name used in errors and reports.
    pub fn describe(&self) -> &'static str {
        match self {
            SpecialKind::Symlink { .. } => "symlink",
            SpecialKind::Fifo => "fifo",
            SpecialKind::Socket => "socket",
            SpecialKind::BlockDevice => "block_device",
            SpecialKind::CharDevice => "char_device",
            SpecialKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialKind::Symlink { target } => write!(f, "symlink -> {}", target.display()),
            other => write!(f, "{}", other.describe()),
        }
    }
}

/// What capture does with entries that are neither files nor directories.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpecialEntryPolicy {
    /// Fail the capture, naming the entry.
    #[default]
    Reject,
    /// Record the entry in `Snapshot::specials`.
    Record,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new(algo: HashAlgo) -> Self {
        Self {
            algo,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            specials: BTreeMap::new(),
        }
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        self.files.insert(path.into(), fingerprint.into());
        self
    }

    /// Add a directory, builder style.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    /// Add a special entry, builder style.
    pub fn with_special(mut self, path: impl Into<PathBuf>, kind: SpecialKind) -> Self {
        self.specials.insert(path.into(), kind);
        self
    }

    /// Get the number of files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Get the number of directories.
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Check whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty() && self.specials.is_empty()
    }

    /// Get the fingerprint of a file.
    pub fn fingerprint(&self, path: &Path) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Check if a path was captured under any kind.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path) || self.specials.contains_key(path)
    }

    /// All captured paths, in order.
    pub fn paths(&self) -> BTreeSet<&Path> {
        self.files
            .keys()
            .chain(self.dirs.iter())
            .chain(self.specials.keys())
            .map(PathBuf::as_path)
            .collect()
    }
}
