//! Snapshot capture.

use std::path::Path;

use fs_err as fs;
use walkdir::{DirEntry, WalkDir};

use crate::helpers::hash::{Fingerprinter, HashAlgo};
use crate::helpers::paths::normalize;
use crate::types::{Config, Snapshot, SpecialEntryPolicy, SpecialKind};
use crate::FsvError;

/// Options for snapshot capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Fingerprint algorithm.
    pub algo: HashAlgo,
    /// What to do with entries that are neither files nor directories.
    pub specials: SpecialEntryPolicy,
}

impl From<&Config> for CaptureOptions {
    fn from(config: &Config) -> Self {
        Self {
            algo: config.fingerprint,
            specials: config.special_entries,
        }
    }
}

/// Capture `root` (resolved against `base`) with default options.
pub fn capture(base: &Path, root: &Path) -> Result<Snapshot, FsvError> {
    capture_with(base, root, CaptureOptions::default())
}

/// Capture the subtree at `base/root`.
///
/// Keys are `root`-prefixed paths relative to `base`, so capturing
/// `test_data` under two different bases yields comparable snapshots. The
/// walk never follows symlinks and never writes.
pub fn capture_with(
    base: &Path,
    root: &Path,
    options: CaptureOptions,
) -> Result<Snapshot, FsvError> {
    let start = base.join(root);
    if let Err(e) = fs::symlink_metadata(&start) {
        return Err(if e.kind() == std::io::ErrorKind::NotFound {
            FsvError::root_not_found(&start)
        } else {
            e.into()
        });
    }

    log::debug!("Capturing snapshot of {}", start.display());
    let fingerprinter = Fingerprinter::new(options.algo);
    let mut snapshot = Snapshot::new(options.algo);

    for entry in WalkDir::new(&start).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let suffix = entry
            .path()
            .strip_prefix(&start)
            .map_err(|_| FsvError::io_at(entry.path(), "entry escaped the capture root"))?;
        let rel = normalize(&root.join(suffix));
        if rel.as_os_str().is_empty() {
            // Capturing the base itself: the root has no name of its own.
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            snapshot.dirs.insert(rel);
        } else if file_type.is_file() {
            let fingerprint = fingerprinter.fingerprint(entry.path())?;
            snapshot.files.insert(rel, fingerprint);
        } else {
            let kind = classify_special(&entry)?;
            match options.specials {
                SpecialEntryPolicy::Reject => {
                    return Err(FsvError::unsupported_entry(rel, kind.describe()));
                }
                SpecialEntryPolicy::Record => {
                    log::debug!("Recording {} as {}", rel.display(), kind);
                    snapshot.specials.insert(rel, kind);
                }
            }
        }
    }

    log::debug!(
        "Captured {} files, {} dirs, {} special entries under {}",
        snapshot.file_count(),
        snapshot.dir_count(),
        snapshot.specials.len(),
        start.display()
    );
    Ok(snapshot)
}

fn classify_special(entry: &DirEntry) -> Result<SpecialKind, FsvError> {
    let file_type = entry.file_type();
    if file_type.is_symlink() {
        let target = fs::read_link(entry.path())?;
        return Ok(SpecialKind::Symlink { target });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return Ok(SpecialKind::Fifo);
        }
        if file_type.is_socket() {
            return Ok(SpecialKind::Socket);
        }
        if file_type.is_block_device() {
            return Ok(SpecialKind::BlockDevice);
        }
        if file_type.is_char_device() {
            return Ok(SpecialKind::CharDevice);
        }
    }

    Ok(SpecialKind::Unknown)
}
