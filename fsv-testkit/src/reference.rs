//! In-process reference archiver.
//!
//! Artifacts are JSON manifests named `fsarc_<unix seconds>.json`. The first
//! artifact in a directory is full. Later ones are deltas against the newest
//! existing artifact: a file whose content fingerprint is unchanged is stored
//! as a back-reference to the artifact holding its bytes, everything else is
//! stored in full. Back-references always point at the artifact with the
//! bytes, so restore never follows more than one hop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs_err as fs;
use fsv_core::helpers::paths::{normalize, to_slash};
use fsv_core::{ArchiveKind, Clock, ExclusionSet, Fingerprinter, FsvError, HashAlgo};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::archiver::{Archiver, ArtifactConvention, CreateRequest, Invocation, RestoreRequest};

pub const REFERENCE_PREFIX: &str = "fsarc_";
pub const REFERENCE_SUFFIX: &str = ".json";

const MANIFEST_VERSION: u32 = 1;

/// On-disk artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub kind: ArchiveKind,
    /// Artifact this delta was computed against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub entries: Vec<ManifestEntry>,
}

/// One archived path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestEntry {
    Dir {
        path: String,
    },
    File {
        path: String,
        fingerprint: String,
        data: Vec<u8>,
    },
    /// Bytes live in `artifact`.
    Unchanged {
        path: String,
        fingerprint: String,
        artifact: String,
    },
}

impl ManifestEntry {
    pub fn path(&self) -> &str {
        match self {
            ManifestEntry::Dir { path }
            | ManifestEntry::File { path, .. }
            | ManifestEntry::Unchanged { path, .. } => path,
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, FsvError> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn file_data(&self, path: &str) -> Option<&[u8]> {
        self.entries.iter().find_map(|e| match e {
            ManifestEntry::File { path: p, data, .. } if p == path => Some(data.as_slice()),
            _ => None,
        })
    }
}

/// Archiver that writes JSON manifests.
pub struct ManifestArchiver {
    clock: Arc<dyn Clock>,
    fingerprinter: Fingerprinter,
    convention: ArtifactConvention,
}

impl ManifestArchiver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            fingerprinter: Fingerprinter::new(HashAlgo::Blake3),
            convention: ArtifactConvention::new(REFERENCE_PREFIX, REFERENCE_SUFFIX),
        }
    }

    /// Where the bytes of each file in `artifact` live, keyed by path.
    fn holders(&self, workdir: &Path, artifact: &str) -> Result<BTreeMap<String, (String, String)>, FsvError> {
        let manifest = Manifest::load(&workdir.join(artifact))?;
        let mut out = BTreeMap::new();
        for entry in manifest.entries {
            match entry {
                ManifestEntry::File {
                    path, fingerprint, ..
                } => {
                    out.insert(path, (fingerprint, artifact.to_string()));
                }
                ManifestEntry::Unchanged {
                    path,
                    fingerprint,
                    artifact: holder,
                } => {
                    out.insert(path, (fingerprint, holder));
                }
                ManifestEntry::Dir { .. } => {}
            }
        }
        Ok(out)
    }
}

impl Archiver for ManifestArchiver {
    fn name(&self) -> &str {
        "reference"
    }

    fn convention(&self) -> &ArtifactConvention {
        &self.convention
    }

    fn create(&self, request: &CreateRequest<'_>) -> Result<Invocation, FsvError> {
        let now = self.clock.now();
        let name = self.convention.name_for(now.timestamp());
        let target = request.workdir.join(&name);
        if target.exists() {
            return Err(FsvError::archiver(
                "create",
                format!("artifact {} already exists", name),
            ));
        }

        let exclusions = ExclusionSet::new(request.excludes)?;
        let base = if request.force_full {
            None
        } else {
            self.convention.newest(request.workdir)?
        };
        let previous = match &base {
            Some(artifact) => self.holders(request.workdir, artifact)?,
            None => BTreeMap::new(),
        };

        let mut entries = Vec::new();
        for source in request.sources {
            let start = request.workdir.join(source);
            if !start.exists() {
                return Err(FsvError::archiver(
                    "create",
                    format!("source not found: {}", source.display()),
                ));
            }
            let walker = WalkDir::new(&start)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| !exclusions.is_excluded(&relative(&start, source, e.path())));
            for entry in walker {
                let entry = entry?;
                let rel = relative(&start, source, entry.path());
                if rel.as_os_str().is_empty() {
                    continue;
                }
                let path = to_slash(&rel);
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    entries.push(ManifestEntry::Dir { path });
                } else if file_type.is_file() {
                    let fingerprint = self.fingerprinter.fingerprint(entry.path())?;
                    match previous.get(&path) {
                        Some((fp, holder)) if *fp == fingerprint => {
                            entries.push(ManifestEntry::Unchanged {
                                path,
                                fingerprint,
                                artifact: holder.clone(),
                            });
                        }
                        _ => {
                            let data = fs::read(entry.path())?;
                            entries.push(ManifestEntry::File {
                                path,
                                fingerprint,
                                data,
                            });
                        }
                    }
                } else {
                    log::warn!("Skipping special entry {}", entry.path().display());
                }
            }
        }

        let kind = if base.is_some() {
            ArchiveKind::Delta
        } else {
            ArchiveKind::Full
        };
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            created_at: now,
            kind,
            base,
            entries,
        };
        fs::write(&target, serde_json::to_vec(&manifest)?)?;
        log::info!(
            "Reference archiver wrote {} ({}, {} entries)",
            name,
            kind,
            manifest.entries.len()
        );
        Ok(Invocation::ok(format!("{}\n", name)))
    }

    fn restore(&self, request: &RestoreRequest<'_>) -> Result<Invocation, FsvError> {
        let artifact_path = request.workdir.join(request.artifact);
        if !artifact_path.is_file() {
            return Err(FsvError::archiver(
                "restore",
                format!("artifact not found: {}", request.artifact),
            ));
        }
        let artifact_dir = artifact_path.parent().unwrap_or(request.workdir);
        let manifest = Manifest::load(&artifact_path)?;
        let mut holders: BTreeMap<String, Manifest> = BTreeMap::new();

        for entry in &manifest.entries {
            let dest = request.dest.join(entry.path());
            match entry {
                ManifestEntry::Dir { .. } => fs::create_dir_all(&dest)?,
                ManifestEntry::File { data, .. } => write_file(&dest, data)?,
                ManifestEntry::Unchanged { path, artifact, .. } => {
                    if !holders.contains_key(artifact) {
                        let holder_path = artifact_dir.join(artifact);
                        if !holder_path.is_file() {
                            return Err(FsvError::archiver(
                                "restore",
                                format!("{} references missing artifact {}", request.artifact, artifact),
                            ));
                        }
                        holders.insert(artifact.clone(), Manifest::load(&holder_path)?);
                    }
                    let data = holders
                        .get(artifact)
                        .and_then(|m| m.file_data(path))
                        .ok_or_else(|| {
                            FsvError::archiver(
                                "restore",
                                format!("{} does not hold {}", artifact, path),
                            )
                        })?;
                    write_file(&dest, data)?;
                }
            }
        }

        log::info!(
            "Reference archiver restored {} into {}",
            request.artifact,
            request.dest.display()
        );
        Ok(Invocation::ok(String::new()))
    }
}

/// Path of `entry` as the archive records it: `source` plus the part below `start`.
fn relative(start: &Path, source: &Path, entry: &Path) -> PathBuf {
    let below = entry.strip_prefix(start).unwrap_or(entry);
    normalize(&source.join(below))
}

fn write_file(dest: &Path, data: &[u8]) -> Result<(), FsvError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsv_core::ManualClock;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<ManualClock>, ManifestArchiver) {
        let tmp = TempDir::new().unwrap();
        for (rel, content) in [
            ("test_data/a.txt", "alpha"),
            ("test_data/abc/something.txt", "beta"),
            ("test_data/abc/def/something.txt", "gamma"),
        ] {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let clock = Arc::new(ManualClock::at_epoch_secs(1_700_000_000));
        let archiver = ManifestArchiver::new(clock.clone());
        (tmp, clock, archiver)
    }

    fn create(archiver: &ManifestArchiver, dir: &Path, excludes: &[String], force_full: bool) -> String {
        let sources = vec![PathBuf::from("test_data")];
        let inv = archiver
            .create(&CreateRequest {
                workdir: dir,
                sources: &sources,
                excludes,
                force_full,
            })
            .unwrap();
        inv.stdout.trim().to_string()
    }

    #[test]
    fn test_first_artifact_is_full() {
        let (tmp, _clock, archiver) = setup();
        let name = create(&archiver, tmp.path(), &[], false);
        assert_eq!(name, "fsarc_1700000000.json");

        let manifest = Manifest::load(&tmp.path().join(&name)).unwrap();
        assert_eq!(manifest.kind, ArchiveKind::Full);
        assert!(manifest.entries.contains(&ManifestEntry::Dir {
            path: "test_data".into()
        }));
    }

    #[test]
    fn test_same_second_collides() {
        let (tmp, _clock, archiver) = setup();
        create(&archiver, tmp.path(), &[], false);
        let sources = vec![PathBuf::from("test_data")];
        let err = archiver
            .create(&CreateRequest {
                workdir: tmp.path(),
                sources: &sources,
                excludes: &[],
                force_full: false,
            })
            .unwrap_err();
        assert!(err.is_archiver_error());
    }

    #[test]
    fn test_delta_references_stay_one_hop() {
        let (tmp, clock, archiver) = setup();
        let first = create(&archiver, tmp.path(), &[], false);
        clock.advance(Duration::from_secs(2));
        let second = create(&archiver, tmp.path(), &[], false);
        clock.advance(Duration::from_secs(2));
        let third = create(&archiver, tmp.path(), &[], false);

        let manifest = Manifest::load(&tmp.path().join(&third)).unwrap();
        assert_eq!(manifest.kind, ArchiveKind::Delta);
        assert_eq!(manifest.base.as_deref(), Some(second.as_str()));
        for entry in &manifest.entries {
            if let ManifestEntry::Unchanged { artifact, .. } = entry {
                assert_eq!(artifact, &first);
            }
        }
    }

    #[test]
    fn test_changed_file_stored_in_full() {
        let (tmp, clock, archiver) = setup();
        create(&archiver, tmp.path(), &[], false);
        fs::write(tmp.path().join("test_data/a.txt"), "changed").unwrap();
        clock.advance(Duration::from_secs(2));
        let second = create(&archiver, tmp.path(), &[], false);

        let manifest = Manifest::load(&tmp.path().join(&second)).unwrap();
        assert_eq!(
            manifest.file_data("test_data/a.txt"),
            Some(b"changed".as_slice())
        );
    }

    #[test]
    fn test_restore_resolves_back_references() {
        let (tmp, clock, archiver) = setup();
        create(&archiver, tmp.path(), &[], false);
        clock.advance(Duration::from_secs(2));
        let second = create(&archiver, tmp.path(), &[], false);

        let dest = tmp.path().join("out");
        fs::create_dir(&dest).unwrap();
        archiver
            .restore(&RestoreRequest {
                workdir: tmp.path(),
                artifact: &second,
                dest: &dest,
            })
            .unwrap();

        let restored = fs::read_to_string(dest.join("test_data/abc/def/something.txt")).unwrap();
        assert_eq!(restored, "gamma");
    }

    #[test]
    fn test_exclusions_prune_subtrees() {
        let (tmp, _clock, archiver) = setup();
        let name = create(&archiver, tmp.path(), &["abc".to_string()], false);
        let manifest = Manifest::load(&tmp.path().join(&name)).unwrap();
        let paths: Vec<_> = manifest.entries.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(paths, vec!["test_data", "test_data/a.txt"]);
    }

    #[test]
    fn test_force_full_ignores_previous() {
        let (tmp, clock, archiver) = setup();
        create(&archiver, tmp.path(), &[], false);
        clock.advance(Duration::from_secs(2));
        let second = create(&archiver, tmp.path(), &[], true);
        let manifest = Manifest::load(&tmp.path().join(&second)).unwrap();
        assert_eq!(manifest.kind, ArchiveKind::Full);
        assert!(manifest
            .entries
            .iter()
            .all(|e| !matches!(e, ManifestEntry::Unchanged { .. })));
    }
}
