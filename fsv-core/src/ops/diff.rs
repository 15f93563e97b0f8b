//! Snapshot differencing.

use crate::types::{DiffEntry, Side, Snapshot, SnapshotDiff};

/// Compare two snapshots with the left side as reference.
pub fn diff(left: &Snapshot, right: &Snapshot) -> SnapshotDiff {
    diff_with_reference(left, right, Side::Left)
}

/// Compare two snapshots.
///
/// A path missing on one side is classified as missing and never compared
/// further. A path present on both sides with different content is
/// classified once, as divergent on the side opposite to `reference`.
pub fn diff_with_reference(left: &Snapshot, right: &Snapshot, reference: Side) -> SnapshotDiff {
    debug_assert!(
        left.files.is_empty() || right.files.is_empty() || left.algo == right.algo,
        "snapshots fingerprinted with different algorithms"
    );

    let differs = DiffEntry::ContentDiffers {
        divergent: reference.opposite(),
    };
    let mut out = SnapshotDiff::default();

    for (path, left_fp) in &left.files {
        match right.files.get(path) {
            None => {
                out.files.insert(path.clone(), DiffEntry::MissingInRight);
            }
            Some(right_fp) if right_fp != left_fp => {
                out.files.insert(path.clone(), differs);
            }
            Some(_) => {}
        }
    }
    for path in right.files.keys() {
        if !left.files.contains_key(path) {
            out.files.insert(path.clone(), DiffEntry::MissingInLeft);
        }
    }

    for path in left.dirs.difference(&right.dirs) {
        out.dirs.insert(path.clone(), DiffEntry::MissingInRight);
    }
    for path in right.dirs.difference(&left.dirs) {
        out.dirs.insert(path.clone(), DiffEntry::MissingInLeft);
    }

    for (path, left_kind) in &left.specials {
        match right.specials.get(path) {
            None => {
                out.specials.insert(path.clone(), DiffEntry::MissingInRight);
            }
            Some(right_kind) if right_kind != left_kind => {
                out.specials.insert(path.clone(), differs);
            }
            Some(_) => {}
        }
    }
    for path in right.specials.keys() {
        if !left.specials.contains_key(path) {
            out.specials.insert(path.clone(), DiffEntry::MissingInLeft);
        }
    }

    log::debug!("Diff found {} differences", out.len());
    out
}
