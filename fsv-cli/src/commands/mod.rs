//! fsv command implementations.
//!
//! Each subcommand lives in its own module and delegates to fsv-core or
//! fsv-testkit for the actual work. Every `run` returns whether the command
//! succeeded; `false` becomes exit code 1.

pub mod diff;
pub mod init;
pub mod list;
pub mod reference;
pub mod run;
pub mod snapshot;

use std::path::{Path, PathBuf};

use anyhow::Result;
use fsv_core::Config;

/// Find `fsv.toml` above `cwd`, falling back to defaults rooted at `cwd`.
pub fn load_config(cwd: &Path) -> Result<(PathBuf, Config)> {
    match Config::find(cwd) {
        Some(found) => Ok(found?),
        None => {
            log::debug!("No config found, using defaults in {}", cwd.display());
            Ok((cwd.to_path_buf(), Config::default()))
        }
    }
}
