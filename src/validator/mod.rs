//! The schema validation seam.
//!
//! A [`SchemaValidator`] takes a converted document and a schema file and
//! answers valid / invalid. The production implementation
//! ([`xmllint::XmllintValidator`]) parses both files with [`xml`] first, so
//! a malformed document is reported as such rather than as a wall of schema
//! errors, then delegates XSD conformance to `xmllint`.

pub mod xml;
pub mod xmllint;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use xmllint::XmllintValidator;

/// One schema violation reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// 1-based line in the document, when the validator reports one.
    pub line: Option<u32>,
    pub message: String,
}

/// Errors raised by a schema validator.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The document is not well-formed and cannot be checked.
    #[error("'{path}' is not well-formed XML: {detail}")]
    Malformed { path: PathBuf, detail: String },

    /// The schema file could not be parsed or compiled.
    #[error("schema '{path}' cannot be loaded: {detail}")]
    SchemaUnreadable { path: PathBuf, detail: String },

    /// The document was checked and does not conform.
    #[error("{}", summarise(.violations))]
    Invalid { violations: Vec<SchemaViolation> },

    /// The validator tool itself is missing or could not be started.
    #[error("validator '{program}' unavailable: {detail}")]
    Unavailable { program: PathBuf, detail: String },

    /// Anything else a validator implementation needs to report.
    #[error("{0}")]
    Other(String),
}

fn summarise(violations: &[SchemaViolation]) -> String {
    match violations.first() {
        None => "document does not conform to schema".to_string(),
        Some(first) => {
            let at = first.line.map(|l| format!("line {l}: ")).unwrap_or_default();
            if violations.len() == 1 {
                format!("{at}{}", first.message)
            } else {
                format!(
                    "{at}{} (and {} more violations)",
                    first.message,
                    violations.len() - 1
                )
            }
        }
    }
}

/// A black-box structural validator.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Short validator name for logs and reports.
    fn name(&self) -> &str;

    /// Check `document` against `schema`. `Ok(())` means valid.
    async fn validate(&self, document: &Path, schema: &Path) -> Result<(), ValidatorError>;
}
