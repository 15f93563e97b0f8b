//! Subprocess archiver driven by argv templates.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fsv_core::helpers::paths::to_slash;
use fsv_core::{ArchiverConfig, FsvError};

use crate::archiver::{Archiver, ArtifactConvention, CreateRequest, Invocation, RestoreRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external archiver program.
///
/// Every argument is a template substituted on its own and handed to the
/// process directly; nothing goes through a shell.
#[derive(Debug, Clone)]
pub struct CommandArchiver {
    program: PathBuf,
    config: ArchiverConfig,
    convention: ArtifactConvention,
    name: String,
}

impl CommandArchiver {
    /// Create from config. A relative program path containing a separator is
    /// resolved against `config_dir`.
    pub fn new(config: ArchiverConfig, config_dir: &Path) -> Self {
        let program = if config.program.is_relative() && config.program.components().count() > 1
        {
            config_dir.join(&config.program)
        } else {
            config.program.clone()
        };
        let convention =
            ArtifactConvention::new(&config.artifact_prefix, &config.artifact_suffix);
        let name = config.program.display().to_string();
        Self {
            program,
            config,
            convention,
            name,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for a create invocation.
    pub fn create_args(&self, request: &CreateRequest<'_>) -> Vec<String> {
        let workdir = request.workdir.display().to_string();
        let mut args = self.config.base_args.clone();
        args.extend(substitute_all(&self.config.create_args, &[("{workdir}", &workdir)]));
        for pattern in request.excludes {
            args.extend(substitute_all(&self.config.exclude_args, &[("{pattern}", pattern)]));
        }
        if request.force_full {
            args.extend(self.config.force_full_args.iter().cloned());
        }
        args.extend(request.sources.iter().map(|s| to_slash(s)));
        args
    }

    /// Arguments for a restore invocation.
    pub fn restore_args(&self, request: &RestoreRequest<'_>) -> Vec<String> {
        let dest = request.dest.display().to_string();
        let mut args = self.config.base_args.clone();
        args.extend(substitute_all(
            &self.config.restore_args,
            &[("{dest}", &dest), ("{artifact}", request.artifact)],
        ));
        args
    }

    fn run(&self, operation: &str, args: &[String], workdir: &Path) -> Result<Invocation, FsvError> {
        log::info!(
            "Running archiver {}: {} {}",
            operation,
            self.program.display(),
            args.join(" ")
        );
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FsvError::archiver(
                    operation,
                    format!("failed to spawn {}: {}", self.program.display(), e),
                )
            })?;

        let invocation = match self.config.timeout() {
            Some(limit) => wait_with_timeout(&mut child, operation, limit)?,
            None => {
                let output = child
                    .wait_with_output()
                    .map_err(|e| FsvError::archiver(operation, e.to_string()))?;
                Invocation {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed: Duration::ZERO,
                }
            }
        };

        let invocation = Invocation {
            elapsed: started.elapsed(),
            ..invocation
        };
        log::debug!(
            "Archiver {} exited with {} after {:?}",
            operation,
            invocation.exit_code,
            invocation.elapsed
        );
        Ok(invocation)
    }
}

impl Archiver for CommandArchiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn convention(&self) -> &ArtifactConvention {
        &self.convention
    }

    fn create(&self, request: &CreateRequest<'_>) -> Result<Invocation, FsvError> {
        let args = self.create_args(request);
        self.run("create", &args, request.workdir)
    }

    fn restore(&self, request: &RestoreRequest<'_>) -> Result<Invocation, FsvError> {
        let args = self.restore_args(request);
        self.run("restore", &args, request.workdir)
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter()
        .fold(template.to_string(), |acc, (key, value)| acc.replace(key, value))
}

fn substitute_all(templates: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    templates.iter().map(|t| substitute(t, vars)).collect()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_timeout(
    child: &mut Child,
    operation: &str,
    limit: Duration,
) -> Result<Invocation, FsvError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + limit;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                log::warn!("Archiver {} exceeded {:?}, killing it", operation, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Err(FsvError::archiver_timeout(operation, limit.as_secs()));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(FsvError::archiver(operation, e.to_string())),
        }
    };

    Ok(Invocation {
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        elapsed: Duration::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        workdir: &'a Path,
        sources: &'a [PathBuf],
        excludes: &'a [String],
        force_full: bool,
    ) -> CreateRequest<'a> {
        CreateRequest {
            workdir,
            sources,
            excludes,
            force_full,
        }
    }

    #[test]
    fn test_create_args_follow_templates() {
        let archiver = CommandArchiver::new(ArchiverConfig::default(), Path::new("/ws"));
        let sources = vec![PathBuf::from("test_data")];
        let excludes = vec!["*/a.txt".to_string(), "*something.txt".to_string()];

        let args = archiver.create_args(&request(Path::new("/ws"), &sources, &excludes, true));
        assert_eq!(
            args,
            vec![
                "-a",
                "/ws",
                "-x",
                "*/a.txt",
                "-x",
                "*something.txt",
                "--force-new-arc",
                "test_data"
            ]
        );
    }

    #[test]
    fn test_pattern_with_spaces_stays_one_argument() {
        let archiver = CommandArchiver::new(ArchiverConfig::default(), Path::new("/ws"));
        let sources = vec![PathBuf::from("test_data")];
        let excludes = vec!["my file;rm -rf *".to_string()];

        let args = archiver.create_args(&request(Path::new("/ws"), &sources, &excludes, false));
        assert!(args.contains(&"my file;rm -rf *".to_string()));
        assert!(!args.contains(&"--force-new-arc".to_string()));
    }

    #[test]
    fn test_restore_args_and_base_args() {
        let config = ArchiverConfig {
            program: PathBuf::from("fsv"),
            base_args: vec!["reference-archiver".into()],
            ..ArchiverConfig::default()
        };
        let archiver = CommandArchiver::new(config, Path::new("/ws"));
        let args = archiver.restore_args(&RestoreRequest {
            workdir: Path::new("/ws"),
            artifact: "fsarc_1.zip",
            dest: Path::new("/ws/out"),
        });
        assert_eq!(
            args,
            vec!["reference-archiver", "-d", "/ws/out", "-r", "fsarc_1.zip"]
        );
    }

    #[test]
    fn test_relative_program_resolved_against_config_dir() {
        let archiver = CommandArchiver::new(ArchiverConfig::default(), Path::new("/ws"));
        assert_eq!(archiver.program(), Path::new("/ws/./fsarchive"));

        let config = ArchiverConfig {
            program: PathBuf::from("fsarchive"),
            ..ArchiverConfig::default()
        };
        let archiver = CommandArchiver::new(config, Path::new("/ws"));
        assert_eq!(archiver.program(), Path::new("fsarchive"));
    }

    #[test]
    fn test_spawn_failure_is_archiver_error() {
        let config = ArchiverConfig {
            program: PathBuf::from("/nonexistent/fsarchive"),
            ..ArchiverConfig::default()
        };
        let archiver = CommandArchiver::new(config, Path::new("/"));
        let tmp = tempfile::TempDir::new().unwrap();
        let err = archiver
            .create(&request(tmp.path(), &[], &[], false))
            .unwrap_err();
        assert!(err.is_archiver_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let config = ArchiverConfig {
            program: PathBuf::from("sleep"),
            create_args: vec!["5".into()],
            timeout_secs: Some(0),
            ..ArchiverConfig::default()
        };
        let archiver = CommandArchiver::new(config, Path::new("/"));
        let tmp = tempfile::TempDir::new().unwrap();
        let started = Instant::now();
        let err = archiver
            .create(&request(tmp.path(), &[], &[], false))
            .unwrap_err();
        assert_eq!(err.error_type(), "archiver_timeout");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_exit_code_and_output() {
        let config = ArchiverConfig {
            program: PathBuf::from("sh"),
            create_args: vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
            timeout_secs: Some(10),
            ..ArchiverConfig::default()
        };
        let archiver = CommandArchiver::new(config, Path::new("/"));
        let tmp = tempfile::TempDir::new().unwrap();
        let inv = archiver.create(&request(tmp.path(), &[], &[], false)).unwrap();
        assert_eq!(inv.exit_code, 3);
        assert_eq!(inv.stdout.trim(), "out");
        assert_eq!(inv.stderr.trim(), "err");
        assert!(!inv.success());
    }
}
