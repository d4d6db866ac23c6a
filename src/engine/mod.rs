//! The document conversion engine seam.
//!
//! The pipeline never renders documents itself. It builds an
//! [`EngineRequest`] and hands it to a [`ConversionEngine`]; the production
//! implementation is [`pandoc::PandocEngine`], tests plug in their own.
//!
//! Engines may leave a media directory behind in
//! [`EngineRequest::working_dir`] (pandoc's `--extract-media` does). The
//! caller owns that side effect; see [`crate::pipeline::media`].

pub mod pandoc;

use crate::config::OutputFormat;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub use pandoc::PandocEngine;

/// One invocation of the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    /// Absolute path of the source document.
    pub input: PathBuf,
    /// Target format.
    pub format: OutputFormat,
    /// Engine arguments, in pandoc long-option syntax.
    pub args: Vec<String>,
    /// Filter stages to run, in order.
    pub filters: Vec<String>,
    /// Absolute path the output must be written to.
    pub output: PathBuf,
    /// Directory the engine runs in; relative paths in `args` resolve here.
    pub working_dir: PathBuf,
}

impl EngineRequest {
    /// Value of the first `--name=value` argument, if present.
    pub fn arg_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{}=", name);
        self.args
            .iter()
            .find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

/// What the engine reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub output_formats: Vec<String>,
}

/// Errors raised by a conversion engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be found.
    #[error("engine executable '{program}' not found")]
    NotFound { program: PathBuf },

    /// The engine process could not be started or awaited.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and reported failure.
    #[error("engine exited with {}: {stderr}", .status.map(|c| format!("status {c}")).unwrap_or_else(|| "a signal".to_string()))]
    Failed { status: Option<i32>, stderr: String },

    /// The engine claimed success but the expected output is missing.
    #[error("engine produced no output at '{path}'")]
    MissingOutput { path: PathBuf },

    /// Anything else an engine implementation needs to report.
    #[error("{0}")]
    Other(String),
}

/// A black-box document converter.
///
/// Implementations are called sequentially, one request at a time, and may
/// block for as long as the conversion takes; the caller applies the timeout.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Short engine name for logs and reports.
    fn name(&self) -> &str;

    /// Convert `request.input` into `request.output`.
    async fn convert_file(&self, request: &EngineRequest) -> Result<(), EngineError>;

    /// Describe the engine (version, location, formats).
    async fn info(&self) -> Result<EngineInfo, EngineError>;
}
