//! fsv configuration, stored in `fsv.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::helpers::hash::HashAlgo;
use crate::types::snapshot::SpecialEntryPolicy;
use crate::FsvError;

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "fsv.toml";

/// Default subject tree, relative to the workspace root.
pub const DEFAULT_SUBJECT: &str = "test_data";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Tree that scenarios archive and verify, relative to the workspace root.
    pub subject: PathBuf,

    /// Fingerprint algorithm used by snapshot capture.
    pub fingerprint: HashAlgo,

    /// Handling of symlinks, devices and other special entries.
    pub special_entries: SpecialEntryPolicy,

    /// Spacing between create invocations.
    pub pacing: PacingConfig,

    /// How to invoke the external archiver.
    pub archiver: ArchiverConfig,

    /// How to reset the subject tree between scenarios.
    pub fixture: FixtureConfig,
}

/// Pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    /// Minimum time between the starts of two create invocations.
    pub min_interval_ms: u64,
}

/// External archiver invocation.
///
/// Arguments are argv templates; each element is substituted on its own and
/// passed directly to the process, never through a shell. Placeholders:
/// `{workdir}`, `{pattern}`, `{dest}`, `{artifact}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Program to run.
    pub program: PathBuf,

    /// Arguments placed before every invocation (e.g. a subcommand).
    pub base_args: Vec<String>,

    /// Create-mode arguments; source paths are appended after these.
    pub create_args: Vec<String>,

    /// Arguments repeated once per exclusion pattern.
    pub exclude_args: Vec<String>,

    /// Arguments added when a full (non-delta) archive is requested.
    pub force_full_args: Vec<String>,

    /// Restore-mode arguments.
    pub restore_args: Vec<String>,

    /// Kill the archiver after this many seconds.
    pub timeout_secs: Option<u64>,

    /// Artifact file name prefix.
    pub artifact_prefix: String,

    /// Artifact file name suffix.
    pub artifact_suffix: String,
}

/// Fixture reset strategy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixtureKind {
    /// Rewrite the subject from the built-in baseline.
    #[default]
    Seeded,
    /// Restore the subject from the enclosing git repository's HEAD.
    Git,
}

/// Fixture settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixtureConfig {
    pub kind: FixtureKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subject: PathBuf::from(DEFAULT_SUBJECT),
            fingerprint: HashAlgo::default(),
            special_entries: SpecialEntryPolicy::default(),
            pacing: PacingConfig::default(),
            archiver: ArchiverConfig::default(),
            fixture: FixtureConfig::default(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        // Artifact names carry whole seconds.
        Self {
            min_interval_ms: 1100,
        }
    }
}

impl PacingConfig {
    /// Minimum interval as a `Duration`.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("./fsarchive"),
            base_args: Vec::new(),
            create_args: vec!["-a".into(), "{workdir}".into()],
            exclude_args: vec!["-x".into(), "{pattern}".into()],
            force_full_args: vec!["--force-new-arc".into()],
            restore_args: vec![
                "-d".into(),
                "{dest}".into(),
                "-r".into(),
                "{artifact}".into(),
            ],
            timeout_secs: None,
            artifact_prefix: "fsarc_".into(),
            artifact_suffix: ".zip".into(),
        }
    }
}

impl ArchiverConfig {
    /// Timeout as a `Duration`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, FsvError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration as `fsv.toml` in `directory`.
    pub fn save(&self, directory: &Path) -> Result<PathBuf, FsvError> {
        let config_path = directory.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        log::info!("Configuration saved to {}", config_path.display());
        Ok(config_path)
    }

    /// Find `fsv.toml` by walking up from `start_dir`.
    ///
    /// Returns the directory holding the file together with the parsed
    /// config, or `None` when no config file exists up to the filesystem root.
    pub fn find(start_dir: &Path) -> Option<Result<(PathBuf, Self), FsvError>> {
        let mut dir = start_dir;
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            log::debug!("Looking for config at {}", candidate.display());
            if candidate.is_file() {
                return Some(Self::load(&candidate).map(|c| (dir.to_path_buf(), c)));
            }
            dir = dir.parent()?;
        }
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), FsvError> {
        if self.subject.as_os_str().is_empty() || self.subject.is_absolute() {
            return Err(FsvError::config(format!(
                "subject must be a non-empty relative path, got '{}'",
                self.subject.display()
            )));
        }
        if self.archiver.program.as_os_str().is_empty() {
            return Err(FsvError::config("archiver program must be set"));
        }
        for placeholder in ["{dest}", "{artifact}"] {
            if !self.archiver.restore_args.iter().any(|a| a.contains(placeholder)) {
                return Err(FsvError::config(format!(
                    "archiver restore_args must use {}",
                    placeholder
                )));
            }
        }
        if self.archiver.artifact_prefix.is_empty() && self.archiver.artifact_suffix.is_empty() {
            return Err(FsvError::config(
                "artifact_prefix and artifact_suffix cannot both be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_find_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let mut original = Config::default();
        original.fingerprint = HashAlgo::Md5;
        original.archiver.timeout_secs = Some(30);
        original.save(tmp.path()).unwrap();

        let (root, loaded) = Config::find(&nested).unwrap().unwrap();
        assert_eq!(root, tmp.path());
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "subject = \"data\"\n[pacing]\nmin_interval_ms = 10\n[archiver]\nprogram = \"/usr/bin/fsarchive\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.subject, PathBuf::from("data"));
        assert_eq!(config.pacing.min_interval(), Duration::from_millis(10));
        assert_eq!(config.archiver.program, PathBuf::from("/usr/bin/fsarchive"));
        assert_eq!(config.archiver.artifact_prefix, "fsarc_");
        assert_eq!(config.fixture.kind, FixtureKind::Seeded);
    }

    #[test]
    fn test_validate_rejects_absolute_subject() {
        let config = Config {
            subject: PathBuf::from("/abs"),
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().error_type(), "config_error");
    }

    #[test]
    fn test_validate_requires_restore_placeholders() {
        let mut config = Config::default();
        config.archiver.restore_args = vec!["-r".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "subject = [").unwrap();
        assert_eq!(Config::load(&path).unwrap_err().error_type(), "toml_error");
    }
}
