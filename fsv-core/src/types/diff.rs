//! Classified differences between two snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One side of a comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Classification of a single path. A path that matches has no entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum DiffEntry {
    /// Present on the left, absent on the right.
    MissingInRight,
    /// Present on the right, absent on the left.
    MissingInLeft,
    /// Present on both sides with different content; `divergent` is the side
    /// that departs from the reference side.
    ContentDiffers { divergent: Side },
}

impl DiffEntry {
    /// Stable tag used in reports.
    pub fn tag(&self) -> &'static str {
        match self {
            DiffEntry::MissingInRight => "missing_in_right",
            DiffEntry::MissingInLeft => "missing_in_left",
            DiffEntry::ContentDiffers { .. } => "content_differs",
        }
    }

    /// The same classification seen with left and right swapped.
    pub fn mirrored(self) -> DiffEntry {
        match self {
            DiffEntry::MissingInRight => DiffEntry::MissingInLeft,
            DiffEntry::MissingInLeft => DiffEntry::MissingInRight,
            DiffEntry::ContentDiffers { divergent } => DiffEntry::ContentDiffers {
                divergent: divergent.opposite(),
            },
        }
    }
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffEntry::ContentDiffers { divergent } => {
                write!(f, "content_differs ({} divergent)", divergent)
            }
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Which diff map an entry belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Special,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Dir => write!(f, "dir"),
            EntryKind::Special => write!(f, "special"),
        }
    }
}

/// Difference between two snapshots, one map per entry kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// File classifications.
    pub files: BTreeMap<PathBuf, DiffEntry>,

    /// Directory classifications (never `ContentDiffers`).
    pub dirs: BTreeMap<PathBuf, DiffEntry>,

    /// Special entry classifications.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub specials: BTreeMap<PathBuf, DiffEntry>,
}

/// An expected classification that did not materialize, or an actual one
/// that was not expected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: EntryKind,
    pub path: PathBuf,
    /// `None` means the path was expected to match.
    pub expected: Option<DiffEntry>,
    /// `None` means the path matched.
    pub actual: Option<DiffEntry>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |e: &Option<DiffEntry>| match e {
            Some(entry) => entry.to_string(),
            None => "match".to_string(),
        };
        write!(
            f,
            "{} {}: expected {}, got {}",
            self.kind,
            self.path.display(),
            show(&self.expected),
            show(&self.actual)
        )
    }
}

impl SnapshotDiff {
    /// Check if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty() && self.specials.is_empty()
    }

    /// Get the number of differences across all maps.
    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len() + self.specials.len()
    }

    /// The map for one entry kind.
    pub fn map(&self, kind: EntryKind) -> &BTreeMap<PathBuf, DiffEntry> {
        match kind {
            EntryKind::File => &self.files,
            EntryKind::Dir => &self.dirs,
            EntryKind::Special => &self.specials,
        }
    }

    /// Mutable access to the map for one entry kind.
    pub fn map_mut(&mut self, kind: EntryKind) -> &mut BTreeMap<PathBuf, DiffEntry> {
        match kind {
            EntryKind::File => &mut self.files,
            EntryKind::Dir => &mut self.dirs,
            EntryKind::Special => &mut self.specials,
        }
    }

    /// Record a classification, builder style.
    pub fn with(mut self, kind: EntryKind, path: impl Into<PathBuf>, entry: DiffEntry) -> Self {
        self.map_mut(kind).insert(path.into(), entry);
        self
    }

    /// Every classification as `(kind, path, entry)`, files first.
    pub fn entries(&self) -> impl Iterator<Item = (EntryKind, &Path, DiffEntry)> + '_ {
        [EntryKind::File, EntryKind::Dir, EntryKind::Special]
            .into_iter()
            .flat_map(move |kind| {
                self.map(kind)
                    .iter()
                    .map(move |(p, e)| (kind, p.as_path(), *e))
            })
    }

    /// Paths of one kind with a given tag.
    pub fn paths_tagged(&self, kind: EntryKind, tag: &str) -> BTreeSet<&Path> {
        self.map(kind)
            .iter()
            .filter(|(_, e)| e.tag() == tag)
            .map(|(p, _)| p.as_path())
            .collect()
    }

    /// Paths of one kind classified `missing_in_right`.
    pub fn missing_in_right(&self, kind: EntryKind) -> BTreeSet<&Path> {
        self.paths_tagged(kind, "missing_in_right")
    }

    /// Paths of one kind classified `missing_in_left`.
    pub fn missing_in_left(&self, kind: EntryKind) -> BTreeSet<&Path> {
        self.paths_tagged(kind, "missing_in_left")
    }

    /// Paths of one kind classified `content_differs`.
    pub fn content_differs(&self, kind: EntryKind) -> BTreeSet<&Path> {
        self.paths_tagged(kind, "content_differs")
    }

    /// Compare this (actual) diff against an expected one.
    ///
    /// Returns every path whose classification differs, empty when the diff
    /// is exactly as expected.
    pub fn mismatches_against(&self, expected: &SnapshotDiff) -> Vec<Mismatch> {
        let mut out = Vec::new();
        for kind in [EntryKind::File, EntryKind::Dir, EntryKind::Special] {
            let actual_map = self.map(kind);
            let expected_map = expected.map(kind);
            let paths: BTreeSet<&PathBuf> = actual_map.keys().chain(expected_map.keys()).collect();
            for path in paths {
                let actual = actual_map.get(path).copied();
                let wanted = expected_map.get(path).copied();
                if actual != wanted {
                    out.push(Mismatch {
                        kind,
                        path: path.clone(),
                        expected: wanted,
                        actual,
                    });
                }
            }
        }
        out
    }

    /// Format the diff as a human-readable report.
    pub fn report(&self) -> String {
        if self.is_empty() {
            return "No differences found.".to_string();
        }

        let mut lines = vec![format!("Found {} differences:", self.len())];
        for (kind, path, entry) in self.entries() {
            lines.push(format!("  - {} {}: {}", kind, path.display(), entry));
        }
        lines.join("\n")
    }
}
