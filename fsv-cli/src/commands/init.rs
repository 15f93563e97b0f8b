//! fsv init command.

use std::path::Path;

use anyhow::{bail, Result};
use fsv_core::{Config, CONFIG_FILE_NAME};

use crate::output::Output;

/// Write a default `fsv.toml` into `cwd`.
pub fn run(output: &Output, cwd: &Path) -> Result<bool> {
    if cwd.join(CONFIG_FILE_NAME).exists() {
        bail!("{} already exists in {}", CONFIG_FILE_NAME, cwd.display());
    }
    let path = Config::default().save(cwd)?;
    if output.is_json() {
        output.json(&serde_json::json!({ "status": "initialized", "config": path }));
    } else {
        output.success(&format!("Wrote {}", path.display()));
    }
    Ok(true)
}
