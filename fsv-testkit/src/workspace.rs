//! Workspace handle: root directory, artifact registry and restore directories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use fs_err as fs;
use fsv_core::{FsvError, Generation};
use tempfile::TempDir;

use crate::archiver::ArtifactConvention;

/// Prefix of restore directory names under the workspace root.
pub const RESTORE_DIR_PREFIX: &str = "fsv-restore-";

/// Directory the orchestrator works in.
///
/// Holds the generations created so far in the running scenario and the
/// restore directories it made. Artifacts recorded with [`Workspace::preserve`]
/// belong to someone else and survive [`Workspace::clean`]. A temporary
/// workspace is removed on drop.
#[derive(Debug)]
pub struct Workspace {
    _temp: Option<TempDir>,
    root: PathBuf,
    generations: Vec<Generation>,
    restores: BTreeMap<String, PathBuf>,
    preserved: BTreeSet<String>,
}

impl Workspace {
    /// Create a workspace in a fresh temporary directory.
    pub fn temp() -> Result<Self, FsvError> {
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        Ok(Self {
            _temp: Some(temp),
            root,
            generations: Vec::new(),
            restores: BTreeMap::new(),
            preserved: BTreeSet::new(),
        })
    }

    /// Use an existing directory, creating it if needed.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, FsvError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            _temp: None,
            root,
            generations: Vec::new(),
            restores: BTreeMap::new(),
            preserved: BTreeSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a workspace-relative path.
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// Generations registered in this scenario, oldest first.
    pub fn generations(&self) -> &[Generation] {
        &self.generations
    }

    pub fn latest(&self) -> Option<&Generation> {
        self.generations.last()
    }

    pub fn is_registered(&self, artifact: &str) -> bool {
        self.generations.iter().any(|g| g.artifact == artifact)
    }

    pub(crate) fn register(&mut self, generation: Generation) {
        self.generations.push(generation);
    }

    /// Mark artifacts that were present before the scenario so cleanup
    /// leaves them alone.
    pub(crate) fn preserve<I: IntoIterator<Item = String>>(&mut self, artifacts: I) {
        self.preserved.extend(artifacts);
    }

    pub fn is_preserved(&self, artifact: &str) -> bool {
        self.preserved.contains(artifact)
    }

    /// Restore directory made under `label`, if any.
    pub fn restore_dir(&self, label: &str) -> Option<&Path> {
        self.restores.get(label).map(PathBuf::as_path)
    }

    /// Create an empty directory for restoring under `label`.
    ///
    /// A leftover empty directory is reused; one with content is an error.
    pub fn fresh_restore_dir(&mut self, label: &str) -> Result<PathBuf, FsvError> {
        if label.is_empty() || label.contains(['/', '\\']) || label.starts_with('.') {
            return Err(FsvError::config(format!("invalid restore label '{}'", label)));
        }
        let dir = self.root.join(format!("{}{}", RESTORE_DIR_PREFIX, label));
        if dir.exists() {
            if fs::read_dir(&dir)?.next().is_some() {
                return Err(FsvError::restore_target_not_empty(&dir));
            }
        } else {
            fs::create_dir(&dir)?;
        }
        self.restores.insert(label.to_string(), dir.clone());
        Ok(dir)
    }

    /// Write a file, creating parent directories.
    pub fn write_file(&self, rel: impl AsRef<Path>, contents: &[u8]) -> Result<PathBuf, FsvError> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Remove a file or a whole directory.
    pub fn remove(&self, rel: impl AsRef<Path>) -> Result<(), FsvError> {
        let path = self.path(rel);
        if fs::symlink_metadata(&path)?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Remove artifacts and restore directories, and forget the generations.
    ///
    /// Every artifact matching `convention` is removed, registered or not,
    /// except the preserved ones. All removals are attempted; the first
    /// failure is returned.
    pub fn clean(&mut self, convention: &ArtifactConvention) -> Result<(), FsvError> {
        let mut first_err = None;
        let mut note = |result: Result<(), FsvError>| {
            if let Err(e) = result {
                log::warn!("Cleanup problem: {}", e);
                first_err.get_or_insert(e);
            }
        };

        match convention.list(&self.root) {
            Ok(artifacts) => {
                for name in artifacts {
                    if self.preserved.contains(&name) {
                        log::debug!("Keeping preexisting artifact {}", name);
                        continue;
                    }
                    log::debug!("Removing artifact {}", name);
                    note(fs::remove_file(self.root.join(&name)).map_err(FsvError::from));
                }
            }
            Err(e) => note(Err(e)),
        }
        for (label, dir) in std::mem::take(&mut self.restores) {
            log::debug!("Removing restore directory '{}'", label);
            if dir.exists() {
                note(fs::remove_dir_all(&dir).map_err(FsvError::from));
            }
        }
        self.generations.clear();
        self.preserved.clear();

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
