//! fsv diff command.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use fsv_core::{capture_with, diff, CaptureOptions, SnapshotDiff};

use crate::output::Output;

#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Classification")]
    class: String,
}

#[derive(Serialize)]
struct DiffOutput<'a> {
    identical: bool,
    diff: &'a SnapshotDiff,
}

/// Compare `root` under two bases. Differences make the command fail.
pub fn run(
    output: &Output,
    left_base: &Path,
    right_base: &Path,
    root: &Path,
    options: CaptureOptions,
) -> Result<bool> {
    let left = capture_with(left_base, root, options)?;
    let right = capture_with(right_base, root, options)?;
    let result = diff(&left, &right);

    if output.is_json() {
        output.json(&DiffOutput {
            identical: result.is_empty(),
            diff: &result,
        });
    } else if result.is_empty() {
        output.success("No differences found.");
    } else {
        let rows: Vec<DiffRow> = result
            .entries()
            .map(|(kind, path, entry)| DiffRow {
                kind: kind.to_string(),
                path: path.display().to_string(),
                class: entry.to_string(),
            })
            .collect();
        output.table(&rows);
        output.warn(&format!("{} differences", result.len()));
    }
    Ok(result.is_empty())
}
