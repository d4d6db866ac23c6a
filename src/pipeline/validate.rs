//! Schema validation of one converted output.

use crate::config::{OutputFormat, ResourceLayout};
use crate::error::FormatError;
use crate::validator::{SchemaValidator, ValidatorError};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Check `output` against the schema registered for `format`.
///
/// A format with no registered schema, or whose schema file is missing, is
/// a failure: requesting validation without a schema is a configuration
/// mistake that must show up in the report.
pub async fn validate_output(
    validator: &dyn SchemaValidator,
    output: &Path,
    format: OutputFormat,
    resources: &ResourceLayout,
    timeout_secs: u64,
) -> Result<(), FormatError> {
    let schema = resources
        .schemas
        .get(&format)
        .ok_or(FormatError::SchemaNotFound { format, path: None })?;
    if !schema.is_file() {
        return Err(FormatError::SchemaNotFound {
            format,
            path: Some(schema.clone()),
        });
    }

    info!("Validating {} against {}", format, schema.display());
    let checked = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        validator.validate(output, schema),
    )
    .await
    .map_err(|_| FormatError::ValidationTimeout {
        format,
        secs: timeout_secs,
    })?;

    match checked {
        Ok(()) => {
            debug!("{} is valid", output.display());
            Ok(())
        }
        Err(e) => Err(into_format_error(format, e)),
    }
}

fn into_format_error(format: OutputFormat, err: ValidatorError) -> FormatError {
    let detail = err.to_string();
    match err {
        ValidatorError::Invalid { violations } => FormatError::DocumentInvalid {
            format,
            detail,
            violations,
        },
        _ => FormatError::ValidatorFailed {
            format,
            cause: detail,
        },
    }
}
