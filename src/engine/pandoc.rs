//! Pandoc as a conversion engine.
//!
//! Each request is one `pandoc` process. The process runs with
//! `current_dir` set to [`EngineRequest::working_dir`], which is where
//! pandoc drops the directory named by `--extract-media=<name>`. The engine
//! location is an explicit path rather than an environment variable so
//! concurrent callers can use different pandoc builds.

use super::{ConversionEngine, EngineError, EngineInfo, EngineRequest};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Filter name that maps onto pandoc's built-in `--citeproc` flag instead
/// of an external `--filter`.
pub const BUILTIN_CITEPROC: &str = "citeproc";

/// Runs the `pandoc` executable.
#[derive(Debug, Clone)]
pub struct PandocEngine {
    program: PathBuf,
}

impl Default for PandocEngine {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl PandocEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument vector for one request, without the program name.
    pub fn command_args(request: &EngineRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(request.args.len() + 4);
        args.push(request.input.clone().into_os_string());
        args.push(format!("--to={}", request.format.pandoc_writer()).into());

        let mut output = OsString::from("--output=");
        output.push(&request.output);
        args.push(output);

        args.extend(request.args.iter().map(OsString::from));
        for filter in &request.filters {
            if filter == BUILTIN_CITEPROC {
                args.push("--citeproc".into());
            } else {
                args.push(format!("--filter={}", filter).into());
            }
        }
        args
    }

    async fn run(&self, args: &[&str]) -> Result<String, EngineError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound {
                program: self.program.clone(),
            }
        } else {
            EngineError::Spawn {
                program: self.program.clone(),
                source: e,
            }
        }
    }
}

#[async_trait]
impl ConversionEngine for PandocEngine {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn convert_file(&self, request: &EngineRequest) -> Result<(), EngineError> {
        let args = Self::command_args(request);
        debug!(
            "Running {} {:?} in {}",
            self.program.display(),
            args,
            request.working_dir.display()
        );

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            warn!("pandoc ({}): {}", request.format, stderr);
        }
        if !request.output.exists() {
            return Err(EngineError::MissingOutput {
                path: request.output.clone(),
            });
        }
        Ok(())
    }

    async fn info(&self) -> Result<EngineInfo, EngineError> {
        let version_text = self.run(&["--version"]).await?;
        let version = parse_version(&version_text).unwrap_or_else(|| "unknown".to_string());
        let formats = self.run(&["--list-output-formats"]).await?;
        let path = which::which(&self.program).unwrap_or_else(|_| self.program.clone());
        Ok(EngineInfo {
            name: "pandoc".to_string(),
            version,
            path,
            output_formats: formats
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
        })
    }
}

/// Pull `3.1.11` out of a `pandoc 3.1.11` banner line.
fn parse_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(String::from)
}
