//! External text artifacts: linker map files and parse-command output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{ExternalToolsConfig, LIBFILE_PLACEHOLDER};
use crate::error::{MoteError, Result};
use crate::timeout::{block_on_with_timeout, TimeoutConfig};

/// Where an artifact's lines came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    MapFile(PathBuf),
    Command(String),
    Memory,
}

impl fmt::Display for ArtifactOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactOrigin::MapFile(path) => write!(f, "map file {}", path.display()),
            ArtifactOrigin::Command(cmd) => write!(f, "command '{}'", cmd),
            ArtifactOrigin::Memory => write!(f, "in-memory lines"),
        }
    }
}

/// Read-only lines of one external artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    origin: ArtifactOrigin,
    lines: Vec<String>,
}

impl Artifact {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origin: ArtifactOrigin::Memory,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn origin(&self) -> &ArtifactOrigin {
        &self.origin
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Load a linker map file. Missing, unreadable and empty files are all
    /// reported as [`MoteError::NoArtifactData`].
    pub fn load_map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Map file could not be read");
            MoteError::NoArtifactData {
                source_name: format!("{}: {}", path.display(), e),
            }
        })?;

        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        if lines.is_empty() {
            return Err(MoteError::NoArtifactData {
                source_name: format!("{}: empty map file", path.display()),
            });
        }

        debug!(path = %path.display(), lines = lines.len(), "Loaded map file");
        Ok(Self {
            origin: ArtifactOrigin::MapFile(path.to_path_buf()),
            lines,
        })
    }

    /// Run the configured parse command against `module_path` and capture
    /// its standard output.
    ///
    /// The command runs in the module's directory with `$(LIBFILE)` replaced
    /// by the module's file name. It is killed once the configured timeout
    /// expires.
    pub fn from_command_output<P: AsRef<Path>>(
        config: &ExternalToolsConfig,
        module_path: P,
    ) -> Result<Self> {
        let module_path = module_path.as_ref();
        config.validate()?;
        let template = config.parse_command.as_deref().ok_or_else(|| {
            MoteError::InvalidConfig("parse command requested but PARSE_COMMAND is unset".into())
        })?;

        let file_name = module_path
            .file_name()
            .map(|n| n.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
            .ok_or_else(|| {
                MoteError::InvalidConfig(format!(
                    "module path {} has no file name",
                    module_path.display()
                ))
            })?;
        let command = template.replace(LIBFILE_PLACEHOLDER, &file_name);
        let workdir = module_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        info!(command = %command, workdir = %workdir.display(), "Running parse command");

        let timeout = TimeoutConfig::from_duration(
            Duration::from_secs(config.command_timeout_secs),
            "parse_command",
        );
        let lines = block_on_with_timeout(timeout, run_command(&command, workdir)).map_err(
            |e| match e {
                MoteError::Timeout { seconds } => MoteError::ExternalCommandFailed {
                    command: command.clone(),
                    reason: format!("timed out after {}s", seconds),
                },
                other => other,
            },
        )?;

        if lines.is_empty() {
            return Err(MoteError::NoArtifactData {
                source_name: format!("command '{}' produced no output", command),
            });
        }

        debug!(command = %command, lines = lines.len(), "Captured command output");
        Ok(Self {
            origin: ArtifactOrigin::Command(command),
            lines,
        })
    }
}

async fn run_command(command: &str, workdir: &Path) -> Result<Vec<String>> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| MoteError::InvalidConfig("PARSE_COMMAND is empty".into()))?;

    let failed = |reason: String| MoteError::ExternalCommandFailed {
        command: command.to_string(),
        reason,
    };

    let mut child = Command::new(program)
        .args(parts)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| failed("standard output not captured".into()))?;

    let mut reader = BufReader::new(stdout).lines();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await.map_err(|e| failed(e.to_string()))? {
        lines.push(line);
    }

    let status = child.wait().await.map_err(|e| failed(e.to_string()))?;
    if !status.success() {
        warn!(command = %command, %status, lines = lines.len(), "Parse command exited unsuccessfully");
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_lines() {
        let artifact = Artifact::from_lines(["a", "b"]);
        assert_eq!(artifact.lines(), &["a".to_string(), "b".to_string()]);
        assert_eq!(artifact.origin(), &ArtifactOrigin::Memory);
    }

    #[test]
    fn test_load_map_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, ".data 0x1000 0x10").unwrap();
        writeln!(file, "  0x1000 counter").unwrap();
        let artifact = Artifact::load_map_file(file.path()).unwrap();
        assert_eq!(artifact.lines().len(), 2);
        assert!(matches!(artifact.origin(), ArtifactOrigin::MapFile(_)));
    }

    #[test]
    fn test_missing_and_empty_map_file() {
        let err = Artifact::load_map_file("/nonexistent/dir/module.map").unwrap_err();
        assert!(matches!(err, MoteError::NoArtifactData { .. }));

        let file = NamedTempFile::new().unwrap();
        let err = Artifact::load_map_file(file.path()).unwrap_err();
        assert!(matches!(err, MoteError::NoArtifactData { .. }));
    }

    #[test]
    fn test_command_that_cannot_start() {
        let config = ExternalToolsConfig {
            parse_command: Some("/definitely/not/a/tool $(LIBFILE)".into()),
            ..Default::default()
        };
        let err = Artifact::from_command_output(&config, "/tmp/module.so").unwrap_err();
        assert!(matches!(err, MoteError::ExternalCommandFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_killed_after_timeout() {
        let config = ExternalToolsConfig {
            parse_command: Some("sleep 5".into()),
            command_timeout_secs: 1,
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let err = Artifact::from_command_output(&config, "/tmp/module.so").unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            MoteError::ExternalCommandFailed { command, reason } => {
                assert_eq!(command, "sleep 5");
                assert!(reason.starts_with("timed out"), "reason: {}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_output_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("module.so");
        std::fs::write(&module, "00001000 D counter\n00001010 B buffer\n").unwrap();

        // grep exits with 2 on the missing file but still prints the matches
        let config = ExternalToolsConfig {
            parse_command: Some("grep -h -v nomatch $(LIBFILE) missing.txt".into()),
            ..Default::default()
        };
        let artifact = Artifact::from_command_output(&config, &module).unwrap();

        assert_eq!(
            artifact.lines(),
            &["00001000 D counter".to_string(), "00001010 B buffer".to_string()]
        );
        assert_eq!(
            artifact.origin(),
            &ArtifactOrigin::Command("grep -h -v nomatch module.so missing.txt".into())
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ExternalToolsConfig {
            command_timeout_secs: 0,
            ..Default::default()
        };
        let err = Artifact::from_command_output(&config, "/tmp/module.so").unwrap_err();
        assert!(matches!(err, MoteError::InvalidConfig(_)));
    }

    #[test]
    fn test_command_without_template() {
        let config = ExternalToolsConfig {
            parse_command: None,
            ..Default::default()
        };
        let err = Artifact::from_command_output(&config, "/tmp/module.so").unwrap_err();
        assert!(matches!(err, MoteError::InvalidConfig(_)));
    }
}
