//! Adapter around the external archiving tool.
//!
//! The tool is treated as a black box: it gets an "add" command line and only
//! its exit status decides success. Captured output is logged, never parsed.

use crate::backup::redacted::{RedactedString, REDACTED_SECRET};
use bon::Builder;
use itertools::Itertools;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Verb asking the tool to add files to an archive
static ADD_VERB: &str = "a";
/// Flag prefix carrying the archive password
static PASSWORD_FLAG: &str = "-p";

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Archiver executable not found: {0:?}")]
    ToolMissing(PathBuf),
    #[error("Archiver {tool:?} {reason}")]
    ProcessFailed { tool: PathBuf, reason: String },
}

/// Everything the tool needs to build one archive
#[derive(Debug, Clone, Builder)]
pub struct ArchiveRequest<'a> {
    tool_path: &'a Path,
    source_directory: &'a Path,
    destination_path: &'a Path,
    secret: &'a RedactedString,
    tool_options: &'a [String],
}

impl ArchiveRequest<'_> {
    pub fn source_directory(&self) -> &Path {
        self.source_directory
    }

    pub fn destination_path(&self) -> &Path {
        self.destination_path
    }

    /// Arguments passed to the tool, in order, with the secret in cleartext.
    pub fn arguments(&self) -> Vec<OsString> {
        self.arguments_with_secret(self.secret.secret())
    }

    /// Printable command line, secret replaced by a placeholder.
    pub fn redacted_command_line(&self) -> String {
        std::iter::once(self.tool_path.as_os_str().to_owned())
            .chain(self.arguments_with_secret(REDACTED_SECRET))
            .map(|arg| arg.to_string_lossy().into_owned())
            .join(" ")
    }

    fn arguments_with_secret(&self, secret: &str) -> Vec<OsString> {
        std::iter::once(OsString::from(ADD_VERB))
            .chain(std::iter::once(OsString::from(format!(
                "{PASSWORD_FLAG}{secret}"
            ))))
            .chain(self.tool_options.iter().map(OsString::from))
            .chain(std::iter::once(self.destination_path.as_os_str().to_owned()))
            .chain(std::iter::once(self.source_directory.as_os_str().to_owned()))
            .collect_vec()
    }
}

pub trait Archiver: Send + Sync {
    /// Creates the archive described by `request`.
    ///
    /// The destination must not exist yet, checking that is up to the caller.
    fn create_archive(&self, request: &ArchiveRequest<'_>) -> Result<(), ToolError>;
}

/// Runs a 7-Zip compatible executable
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZip;

impl Archiver for SevenZip {
    fn create_archive(&self, request: &ArchiveRequest<'_>) -> Result<(), ToolError> {
        let tool = request.tool_path;
        if !tool.is_file() {
            return Err(ToolError::ToolMissing(tool.to_path_buf()));
        }

        tracing::info!("Starting archiver: {}", request.redacted_command_line());
        let output = Command::new(tool)
            .args(request.arguments())
            .output()
            .map_err(|e| ToolError::ProcessFailed {
                tool: tool.to_path_buf(),
                reason: format!("could not be started: {e}"),
            })?;

        if output.status.success() {
            log_output(&output, false);
            Ok(())
        } else {
            log_output(&output, true);
            Err(ToolError::ProcessFailed {
                tool: tool.to_path_buf(),
                reason: format!("failed with {}", output.status),
            })
        }
    }
}

fn log_output(output: &Output, failed: bool) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if failed {
        tracing::warn!(stdout = %stdout.trim(), stderr = %stderr.trim(), "Archiver output");
    } else {
        tracing::debug!(stdout = %stdout.trim(), stderr = %stderr.trim(), "Archiver output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request<'a>(
        tool: &'a Path,
        source: &'a Path,
        destination: &'a Path,
        secret: &'a RedactedString,
        options: &'a [String],
    ) -> ArchiveRequest<'a> {
        ArchiveRequest::builder()
            .tool_path(tool)
            .source_directory(source)
            .destination_path(destination)
            .secret(secret)
            .tool_options(options)
            .build()
    }

    #[test]
    fn test_arguments_order() {
        let secret = RedactedString::from("geheim");
        let options = vec!["-mhe=on".to_string(), "-mx=9".to_string()];
        let req = request(
            Path::new("/usr/bin/7z"),
            Path::new("/data/docs"),
            Path::new("/tmp/docs.7z"),
            &secret,
            &options,
        );

        let args = req
            .arguments()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect_vec();
        assert_eq!(
            args,
            vec!["a", "-pgeheim", "-mhe=on", "-mx=9", "/tmp/docs.7z", "/data/docs"]
        );
    }

    #[test]
    fn test_redacted_command_line_hides_secret() {
        let secret = RedactedString::from("geheim");
        let req = request(
            Path::new("/usr/bin/7z"),
            Path::new("/data/docs"),
            Path::new("/tmp/docs.7z"),
            &secret,
            &[],
        );

        let line = req.redacted_command_line();
        assert!(!line.contains("geheim"));
        assert!(line.contains(REDACTED_SECRET));
        assert!(line.starts_with("/usr/bin/7z a -p"));
    }

    #[test]
    fn test_missing_tool_is_reported_before_spawn() {
        let temp_dir = TempDir::new().unwrap();
        let secret = RedactedString::from("geheim");
        let tool = temp_dir.path().join("no-such-7z");
        let destination = temp_dir.path().join("out.7z");
        let req = request(
            &tool,
            temp_dir.path(),
            &destination,
            &secret,
            &[],
        );

        match SevenZip.create_archive(&req) {
            Err(ToolError::ToolMissing(path)) => assert_eq!(path, tool),
            other => panic!("Expected ToolMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_path_pointing_to_directory_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let secret = RedactedString::from("geheim");
        let destination = temp_dir.path().join("out.7z");
        let req = request(
            temp_dir.path(),
            temp_dir.path(),
            &destination,
            &secret,
            &[],
        );

        assert!(matches!(
            SevenZip.create_archive(&req),
            Err(ToolError::ToolMissing(_))
        ));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_tool_receives_arguments() {
        let temp_dir = TempDir::new().unwrap();
        // Writes its full argument list into the destination (4th argument here).
        let tool = write_script(temp_dir.path(), "fake7z", r#"echo "$@" > "$4""#);
        let secret = RedactedString::from("geheim");
        let options = vec!["-mhe=on".to_string()];
        let destination = temp_dir.path().join("out.7z");
        let req = request(&tool, temp_dir.path(), &destination, &secret, &options);

        SevenZip.create_archive(&req).unwrap();

        let written = std::fs::read_to_string(&destination).unwrap();
        assert!(written.starts_with("a -pgeheim -mhe=on "));
        assert!(written.contains(temp_dir.path().to_str().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_process_failure() {
        let temp_dir = TempDir::new().unwrap();
        let tool = write_script(temp_dir.path(), "fail7z", "echo boom >&2\nexit 2");
        let secret = RedactedString::from("geheim");
        let destination = temp_dir.path().join("out.7z");
        let req = request(
            &tool,
            temp_dir.path(),
            &destination,
            &secret,
            &[],
        );

        match SevenZip.create_archive(&req) {
            Err(ToolError::ProcessFailed { tool: failed, reason }) => {
                assert_eq!(failed, tool);
                assert!(reason.contains("failed with"));
            }
            other => panic!("Expected ProcessFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_tool_is_process_failure() {
        let temp_dir = TempDir::new().unwrap();
        let tool = temp_dir.path().join("not-executable");
        std::fs::write(&tool, "plain file").unwrap();
        let secret = RedactedString::from("geheim");
        let destination = temp_dir.path().join("out.7z");
        let req = request(
            &tool,
            temp_dir.path(),
            &destination,
            &secret,
            &[],
        );

        match SevenZip.create_archive(&req) {
            Err(ToolError::ProcessFailed { reason, .. }) => {
                assert!(reason.contains("could not be started"))
            }
            other => panic!("Expected ProcessFailed, got {:?}", other),
        }
    }
}
