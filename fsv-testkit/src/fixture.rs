//! Fixture controllers: put the subject tree back into its baseline state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fs_err as fs;
use fsv_core::helpers::paths::to_slash;
use fsv_core::{FixtureKind, FsvError};
use walkdir::WalkDir;

/// Resets a subject tree between scenarios.
pub trait FixtureController {
    fn name(&self) -> &str;

    /// Bring `root/subject` back to the baseline.
    fn reset(&self, root: &Path, subject: &Path) -> Result<(), FsvError>;
}

/// Build the controller for a configured fixture kind.
pub fn from_kind(kind: FixtureKind) -> Box<dyn FixtureController> {
    match kind {
        FixtureKind::Seeded => Box::new(SeededFixture::baseline()),
        FixtureKind::Git => Box::new(GitFixture),
    }
}

/// Rewrites the subject from an in-memory file set.
#[derive(Debug, Clone, Default)]
pub struct SeededFixture {
    /// Paths relative to the subject.
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl SeededFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard baseline: `a.txt`, `abc/something.txt` and
    /// `abc/def/something.txt`.
    pub fn baseline() -> Self {
        Self::new()
            .with_file("a.txt", b"first line of a\nsecond line of a\n")
            .with_file("abc/something.txt", b"something in abc\n")
            .with_file("abc/def/something.txt", b"something else, deeper in abc/def\n")
    }

    pub fn with_file(mut self, rel: impl Into<PathBuf>, contents: &[u8]) -> Self {
        self.files.insert(rel.into(), contents.to_vec());
        self
    }

    pub fn files(&self) -> &BTreeMap<PathBuf, Vec<u8>> {
        &self.files
    }
}

impl FixtureController for SeededFixture {
    fn name(&self) -> &str {
        "seeded"
    }

    fn reset(&self, root: &Path, subject: &Path) -> Result<(), FsvError> {
        let dir = root.join(subject);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        for (rel, contents) in &self.files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
        }
        log::debug!(
            "Seeded {} with {} files",
            dir.display(),
            self.files.len()
        );
        Ok(())
    }
}

/// Restores the subject to the committed HEAD state of the enclosing git
/// repository and deletes untracked files under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitFixture;

fn git_err(e: git2::Error) -> FsvError {
    FsvError::git(e.message().to_string())
}

impl FixtureController for GitFixture {
    fn name(&self) -> &str {
        "git"
    }

    fn reset(&self, root: &Path, subject: &Path) -> Result<(), FsvError> {
        let repo = git2::Repository::discover(root).map_err(git_err)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| FsvError::fixture("git fixture needs a non-bare repository"))?;
        let workdir = fs::canonicalize(workdir)?;
        let target = fs::canonicalize(root)?.join(subject);
        let rel = target.strip_prefix(&workdir).map_err(|_| {
            FsvError::fixture(format!(
                "{} is outside the repository at {}",
                target.display(),
                workdir.display()
            ))
        })?;
        let pathspec = to_slash(rel);

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force().path(pathspec.as_str());
        repo.checkout_head(Some(&mut checkout)).map_err(git_err)?;

        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(true)
            .recurse_ignored_dirs(true)
            .pathspec(pathspec.as_str());
        let statuses = repo.statuses(Some(&mut options)).map_err(git_err)?;
        let mut removed = 0;
        for entry in statuses.iter() {
            if !entry
                .status()
                .intersects(git2::Status::WT_NEW | git2::Status::IGNORED)
            {
                continue;
            }
            if let Some(path) = entry.path() {
                let path = workdir.join(path);
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                } else if path.exists() {
                    fs::remove_file(&path)?;
                }
                removed += 1;
            }
        }

        // Git never tracks empty directories.
        if target.is_dir() {
            for entry in WalkDir::new(&target).min_depth(1).contents_first(true) {
                let entry = entry?;
                if entry.file_type().is_dir() && fs::read_dir(entry.path())?.next().is_none() {
                    fs::remove_dir(entry.path())?;
                }
            }
        }

        log::debug!(
            "Reset {} to HEAD, removed {} untracked entries",
            target.display(),
            removed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_all(repo: &git2::Repository) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("fsv", "fsv@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "baseline", &tree, &[])
            .unwrap();
    }

    #[test]
    fn test_seeded_reset_discards_changes() {
        let tmp = TempDir::new().unwrap();
        let fixture = SeededFixture::baseline();
        fixture.reset(tmp.path(), Path::new("test_data")).unwrap();

        fs::write(tmp.path().join("test_data/newfile.bin"), [0u8, 1, 2]).unwrap();
        fs::remove_file(tmp.path().join("test_data/a.txt")).unwrap();

        fixture.reset(tmp.path(), Path::new("test_data")).unwrap();
        assert!(tmp.path().join("test_data/a.txt").is_file());
        assert!(!tmp.path().join("test_data/newfile.bin").exists());
        assert!(tmp.path().join("test_data/abc/def/something.txt").is_file());
    }

    #[test]
    fn test_git_reset_restores_head() {
        let tmp = TempDir::new().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        SeededFixture::baseline()
            .reset(tmp.path(), Path::new("test_data"))
            .unwrap();
        fs::write(tmp.path().join("outside.txt"), "keep me").unwrap();
        commit_all(&repo);

        fs::write(tmp.path().join("test_data/a.txt"), "modified").unwrap();
        fs::remove_file(tmp.path().join("test_data/abc/something.txt")).unwrap();
        fs::create_dir_all(tmp.path().join("test_data/new_dir")).unwrap();
        fs::write(tmp.path().join("test_data/new_dir/newfile.bin"), "new").unwrap();
        fs::write(tmp.path().join("outside.txt"), "edited outside").unwrap();

        GitFixture.reset(tmp.path(), Path::new("test_data")).unwrap();

        let baseline = SeededFixture::baseline();
        for (rel, contents) in baseline.files() {
            let on_disk = fs::read(tmp.path().join("test_data").join(rel)).unwrap();
            assert_eq!(&on_disk, contents);
        }
        assert!(!tmp.path().join("test_data/new_dir").exists());
        // Only the subject is touched.
        assert_eq!(
            fs::read_to_string(tmp.path().join("outside.txt")).unwrap(),
            "edited outside"
        );
    }

    #[test]
    fn test_git_reset_outside_repository() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("test_data")).unwrap();
        let err = GitFixture
            .reset(tmp.path(), Path::new("test_data"))
            .unwrap_err();
        assert_eq!(err.error_type(), "git_error");
    }
}
