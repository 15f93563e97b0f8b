//! fsv reference-archiver command.
//!
//! Exposes the in-process reference archiver with an `fsarchive`-style
//! argument grammar so it can stand in for a real archiver binary:
//!
//! ```text
//! fsv reference-archiver -a DIR [-x PATTERN]... [--force-new-arc] SOURCES...
//! fsv reference-archiver -r ARTIFACT [-d DIR]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use fs_err as fs;

use fsv_core::helpers::paths::normalize;
use fsv_core::SystemClock;
use fsv_testkit::{Archiver, CreateRequest, ManifestArchiver, RestoreRequest};

/// Arguments of the reference archiver.
#[derive(Debug, Args)]
pub struct ReferenceArgs {
    /// Create an archive in DIR from SOURCES
    #[clap(short = 'a', long = "archive", value_name = "DIR", conflicts_with_all = ["restore", "dest"])]
    pub archive: Option<PathBuf>,

    /// Exclude entries matching PATTERN (repeatable)
    #[clap(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Write a full archive even when a previous one exists
    #[clap(long = "force-new-arc")]
    pub force_new_arc: bool,

    /// Restore ARTIFACT
    #[clap(short = 'r', long = "restore", value_name = "ARTIFACT")]
    pub restore: Option<PathBuf>,

    /// Restore destination (default: current directory)
    #[clap(short = 'd', long = "dest", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Paths to archive
    pub sources: Vec<PathBuf>,
}

pub fn run(cwd: &Path, args: ReferenceArgs) -> Result<bool> {
    let archiver = ManifestArchiver::new(Arc::new(SystemClock));
    match (&args.archive, &args.restore) {
        (Some(dir), None) => create(&archiver, cwd, dir, &args),
        (None, Some(artifact)) => restore(&archiver, cwd, artifact, args.dest.as_deref()),
        _ => bail!("exactly one of -a DIR or -r ARTIFACT is required"),
    }
}

fn create(archiver: &ManifestArchiver, cwd: &Path, dir: &Path, args: &ReferenceArgs) -> Result<bool> {
    if args.sources.is_empty() {
        bail!("no sources given");
    }
    let workdir = normalize(&cwd.join(dir));
    let mut sources = Vec::with_capacity(args.sources.len());
    for source in &args.sources {
        let absolute = normalize(&cwd.join(source));
        let relative = absolute.strip_prefix(&workdir).map_err(|_| {
            anyhow!(
                "source {} is not inside {}",
                source.display(),
                workdir.display()
            )
        })?;
        sources.push(relative.to_path_buf());
    }

    let invocation = archiver.create(&CreateRequest {
        workdir: &workdir,
        sources: &sources,
        excludes: &args.exclude,
        force_full: args.force_new_arc,
    })?;
    print!("{}", invocation.stdout);
    Ok(true)
}

fn restore(archiver: &ManifestArchiver, cwd: &Path, artifact: &Path, dest: Option<&Path>) -> Result<bool> {
    let artifact = normalize(&cwd.join(artifact));
    let workdir = artifact
        .parent()
        .ok_or_else(|| anyhow!("invalid artifact path {}", artifact.display()))?;
    let name = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid artifact path {}", artifact.display()))?;
    let dest = normalize(&cwd.join(dest.unwrap_or(Path::new("."))));
    fs::create_dir_all(&dest).with_context(|| format!("creating {}", dest.display()))?;

    archiver.restore(&RestoreRequest {
        workdir,
        artifact: name,
        dest: &dest,
    })?;
    Ok(true)
}
