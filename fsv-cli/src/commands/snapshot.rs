//! fsv snapshot command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use fsv_core::{capture_with, CaptureOptions, Snapshot};

use crate::output::Output;

/// Table row for snapshot output.
#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    base: &'a Path,
    root: &'a Path,
    snapshot: &'a Snapshot,
}

/// Capture `root` under `base` and print it.
pub fn run(output: &Output, base: &Path, root: &Path, options: CaptureOptions) -> Result<bool> {
    let snapshot = capture_with(base, root, options)?;

    if output.is_json() {
        output.json(&SnapshotOutput {
            base,
            root,
            snapshot: &snapshot,
        });
        return Ok(true);
    }

    let mut rows: Vec<EntryRow> = snapshot
        .dirs
        .iter()
        .map(|p| EntryRow {
            path: p.display().to_string(),
            kind: "dir".to_string(),
            fingerprint: String::new(),
        })
        .collect();
    rows.extend(snapshot.files.iter().map(|(p, fp)| EntryRow {
        path: p.display().to_string(),
        kind: "file".to_string(),
        fingerprint: fp.clone(),
    }));
    rows.extend(snapshot.specials.iter().map(|(p, kind)| EntryRow {
        path: p.display().to_string(),
        kind: kind.to_string(),
        fingerprint: String::new(),
    }));
    rows.sort_by(|a, b| a.path.cmp(&b.path));

    output.table(&rows);
    output.println(&format!(
        "{} files, {} directories ({})",
        snapshot.file_count(),
        snapshot.dir_count(),
        snapshot.algo
    ));
    Ok(true)
}
