//! Error types for the convalidator library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvalidateError`] is **fatal**: the run cannot produce an archive at
//!   all (missing source, no scratch workspace, unwritable destination).
//!   Returned as `Err(ConvalidateError)` from [`crate::convalidate()`].
//!
//! * [`FormatError`] is **non-fatal**: converting or validating one output
//!   format failed, but the other formats and the packaged source are fine.
//!   Stored inside [`crate::output::RunReport`] so callers can inspect
//!   partial success instead of losing the whole run to one broken format.

use crate::config::OutputFormat;
use crate::validator::SchemaViolation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the convalidator library.
///
/// Per-format failures use [`FormatError`] and are recorded in the
/// [`crate::output::RunReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvalidateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("Source document not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// Process does not have read permission on the source document.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source path exists but is a directory or another non-file entry.
    #[error("Source '{path}' is not a regular file")]
    NotAFile { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation or run-time configuration check failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The conversion engine could not be queried at all.
    #[error("Conversion engine '{engine}' is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    // ── Resource errors ───────────────────────────────────────────────────
    /// Scratch workspace or launch directory could not be set up or torn down.
    #[error("Failed to {action} '{path}': {source}")]
    Resource {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Packaging errors ──────────────────────────────────────────────────
    /// The workspace could not be read or compressed into an archive.
    #[error("Failed to package '{path}': {detail}")]
    Packaging { path: PathBuf, detail: String },

    /// The archive could not be written to its destination.
    #[error("Failed to write archive '{path}': {source}")]
    ArchiveWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Report errors ─────────────────────────────────────────────────────
    /// The archive was written but at least one format failed.
    ///
    /// Returned by [`crate::output::RunReport::into_result`] when the caller
    /// wants to treat any per-format failure as an error.
    #[error("{failed}/{total} format steps failed (archive written to '{archive}')")]
    PartialFailure {
        failed: usize,
        total: usize,
        archive: PathBuf,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which pipeline stage a [`FormatError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conversion,
    Validation,
}

/// A non-fatal error for a single output format.
///
/// The run continues with the remaining formats and still delivers an
/// archive.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum FormatError {
    /// The conversion engine reported a failure.
    #[error("{format}: conversion failed: {cause}")]
    ConversionFailed { format: OutputFormat, cause: String },

    /// The conversion engine did not finish in time and was killed.
    #[error("{format}: conversion timed out after {secs}s")]
    ConversionTimeout { format: OutputFormat, secs: u64 },

    /// Extracted media could not be moved into the workspace.
    #[error("{format}: media relocation failed: {cause}")]
    MediaRelocationFailed { format: OutputFormat, cause: String },

    /// No schema is registered for the format, or the registered file is missing.
    #[error("{format}: schema not found{}", .path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    SchemaNotFound {
        format: OutputFormat,
        path: Option<PathBuf>,
    },

    /// The output does not conform to its schema.
    #[error("{format}: document is not valid: {detail}")]
    DocumentInvalid {
        format: OutputFormat,
        detail: String,
        violations: Vec<SchemaViolation>,
    },

    /// The validator could not check the document (parse failure, tool missing).
    #[error("{format}: validation could not run: {cause}")]
    ValidatorFailed { format: OutputFormat, cause: String },

    /// The validator did not finish in time.
    #[error("{format}: validation timed out after {secs}s")]
    ValidationTimeout { format: OutputFormat, secs: u64 },

    /// Validation was requested but the format was never converted successfully.
    #[error("{format}: validation skipped, no converted output")]
    NotConverted { format: OutputFormat },
}

impl FormatError {
    /// The output format this error belongs to.
    pub fn format(&self) -> OutputFormat {
        match self {
            FormatError::ConversionFailed { format, .. }
            | FormatError::ConversionTimeout { format, .. }
            | FormatError::MediaRelocationFailed { format, .. }
            | FormatError::SchemaNotFound { format, .. }
            | FormatError::DocumentInvalid { format, .. }
            | FormatError::ValidatorFailed { format, .. }
            | FormatError::ValidationTimeout { format, .. }
            | FormatError::NotConverted { format } => *format,
        }
    }

    /// The pipeline stage that failed.
    pub fn kind(&self) -> FailureKind {
        match self {
            FormatError::ConversionFailed { .. }
            | FormatError::ConversionTimeout { .. }
            | FormatError::MediaRelocationFailed { .. } => FailureKind::Conversion,
            _ => FailureKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_not_found_display() {
        let e = FormatError::SchemaNotFound {
            format: OutputFormat::Html,
            path: None,
        };
        assert_eq!(e.to_string(), "html: schema not found");
        assert_eq!(e.kind(), FailureKind::Validation);
    }

    #[test]
    fn schema_not_found_display_with_path() {
        let e = FormatError::SchemaNotFound {
            format: OutputFormat::Tei,
            path: Some(PathBuf::from("/data/schema/tei.xsd")),
        };
        let msg = e.to_string();
        assert!(msg.contains("schema not found"), "got: {msg}");
        assert!(msg.contains("/data/schema/tei.xsd"), "got: {msg}");
    }

    #[test]
    fn conversion_errors_carry_format_and_kind() {
        let e = FormatError::ConversionTimeout {
            format: OutputFormat::Pdf,
            secs: 30,
        };
        assert_eq!(e.format(), OutputFormat::Pdf);
        assert_eq!(e.kind(), FailureKind::Conversion);
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn partial_failure_display() {
        let e = ConvalidateError::PartialFailure {
            failed: 1,
            total: 3,
            archive: PathBuf::from("out.dhc"),
        };
        let msg = e.to_string();
        assert!(msg.contains("1/3"), "got: {msg}");
        assert!(msg.contains("out.dhc"), "got: {msg}");
    }

    #[test]
    fn format_error_serialises_with_tag() {
        let e = FormatError::NotConverted {
            format: OutputFormat::Tei,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["error"], "not_converted");
        assert_eq!(json["format"], "tei");
    }
}
