//! Result types produced by a run.
//!
//! A [`RunReport`] is returned whenever an archive was written, even if
//! every conversion failed. Per-format outcomes are sum types rather than
//! log lines so callers (and tests) can tell a conversion failure from a
//! validation failure and see which format it hit.

use crate::config::OutputFormat;
use crate::error::{ConvalidateError, FailureKind, FormatError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of converting one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Output written into the workspace.
    Converted {
        /// File name of the output at the archive root.
        output: String,
        /// Media directory relocated into the workspace by this conversion.
        media_dir: Option<String>,
    },
    Failed {
        error: FormatError,
    },
}

/// Outcome of validating one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    /// Schema missing, document non-conformant, validator failure, or no
    /// converted output to validate.
    Failed {
        error: FormatError,
    },
}

/// Per-format conversion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub format: OutputFormat,
    #[serde(flatten)]
    pub status: ConversionStatus,
    pub duration_ms: u64,
}

impl ConversionRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ConversionStatus::Converted { .. })
    }

    pub fn error(&self) -> Option<&FormatError> {
        match &self.status {
            ConversionStatus::Failed { error } => Some(error),
            ConversionStatus::Converted { .. } => None,
        }
    }
}

/// Per-format validation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub format: OutputFormat,
    #[serde(flatten)]
    pub status: ValidationStatus,
    pub duration_ms: u64,
}

impl ValidationRecord {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, ValidationStatus::Valid)
    }

    /// True when validation never ran because there was nothing to validate.
    pub fn is_skipped(&self) -> bool {
        matches!(
            self.status,
            ValidationStatus::Failed {
                error: FormatError::NotConverted { .. }
            }
        )
    }

    pub fn error(&self) -> Option<&FormatError> {
        match &self.status {
            ValidationStatus::Failed { error } => Some(error),
            ValidationStatus::Valid => None,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Absolute path of the source document.
    pub source: PathBuf,
    /// Absolute path of the written archive.
    pub archive: PathBuf,
    /// One record per requested format, in request order.
    pub conversions: Vec<ConversionRecord>,
    /// One record per format requested for validation, in request order.
    pub validations: Vec<ValidationRecord>,
    /// Archive entry names in the order they were written.
    pub archive_entries: Vec<String>,
    /// Wall-clock duration of the whole run.
    pub duration_ms: u64,
}

impl RunReport {
    pub fn conversion(&self, format: OutputFormat) -> Option<&ConversionRecord> {
        self.conversions.iter().find(|r| r.format == format)
    }

    pub fn validation(&self, format: OutputFormat) -> Option<&ValidationRecord> {
        self.validations.iter().find(|r| r.format == format)
    }

    /// All per-format errors, conversions first.
    pub fn errors(&self) -> impl Iterator<Item = &FormatError> {
        self.conversions
            .iter()
            .filter_map(ConversionRecord::error)
            .chain(self.validations.iter().filter_map(ValidationRecord::error))
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.errors().filter(|e| e.kind() == kind).count()
    }

    pub fn has_failures(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Treat any per-format failure as an error.
    pub fn into_result(self) -> Result<Self, ConvalidateError> {
        let failed = self.errors().count();
        if failed == 0 {
            Ok(self)
        } else {
            Err(ConvalidateError::PartialFailure {
                failed,
                total: self.conversions.len() + self.validations.len(),
                archive: self.archive,
            })
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Convalidator run:")?;
        writeln!(f, "\tInput:\t{}", self.source.display())?;
        writeln!(f, "\tOutput:\t{}", self.archive.display())?;
        for rec in &self.conversions {
            match &rec.status {
                ConversionStatus::Converted { output, media_dir } => {
                    write!(f, "\tconvert  {:<5} ok      {}", rec.format, output)?;
                    if let Some(dir) = media_dir {
                        write!(f, " (+{}/)", dir)?;
                    }
                    writeln!(f)?;
                }
                ConversionStatus::Failed { error } => {
                    writeln!(f, "\tconvert  {:<5} FAILED  {}", rec.format, error)?;
                }
            }
        }
        for rec in &self.validations {
            match &rec.status {
                ValidationStatus::Valid => writeln!(f, "\tvalidate {:<5} valid", rec.format)?,
                ValidationStatus::Failed { error } => {
                    writeln!(f, "\tvalidate {:<5} FAILED  {}", rec.format, error)?
                }
            }
        }
        write!(f, "\t{} archive entries", self.archive_entries.len())
    }
}
