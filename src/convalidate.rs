//! Run entry points: convert, validate and package one source document.
//!
//! A run never stops at a broken format. Each conversion and each
//! validation is attempted on its own and its outcome recorded in the
//! [`RunReport`]; only problems that make an archive impossible (no source,
//! no workspace, unwritable destination) end the run with an error.

use crate::config::{ConvalidateConfig, OutputFormat};
use crate::engine::{ConversionEngine, EngineInfo, PandocEngine};
use crate::error::{ConvalidateError, FormatError};
use crate::output::{
    ConversionRecord, ConversionStatus, RunReport, ValidationRecord, ValidationStatus,
};
use crate::pipeline::convert::{ConversionContext, ConvertedOutput};
use crate::pipeline::workspace::ScratchWorkspace;
use crate::pipeline::{archive, convert, input, validate};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::validator::{SchemaValidator, XmllintValidator};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Convert `source` into every configured format, validate the selected
/// outputs and package everything into the archive at `destination`.
///
/// # Returns
/// `Ok(RunReport)` whenever the archive was written, even if every
/// conversion failed (the archive then holds only the source). Check
/// [`RunReport::has_failures`] or call [`RunReport::into_result`].
///
/// # Errors
/// Returns `Err(ConvalidateError)` only for fatal errors:
/// - source missing, unreadable, or not a regular file
/// - destination is a directory or the source itself, or the source would
///   collide with an output
/// - scratch workspace cannot be created or removed
/// - archive cannot be built or moved into place
pub async fn convalidate(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConvalidateConfig,
) -> Result<RunReport, ConvalidateError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve paths ────────────────────────────────────────────
    let cwd = std::env::current_dir().map_err(|e| ConvalidateError::Resource {
        action: "determine working directory",
        path: PathBuf::from("."),
        source: e,
    })?;
    let launch_dir = config
        .launch_dir
        .as_deref()
        .map(|d| input::absolutize(d, &cwd))
        .unwrap_or_else(|| cwd.clone());
    if !launch_dir.is_dir() {
        return Err(ConvalidateError::InvalidConfig(format!(
            "Launch directory '{}' does not exist",
            launch_dir.display()
        )));
    }

    let src = input::resolve_source(source.as_ref(), &cwd)?;
    let (archive_path, stem) = input::resolve_destination(destination.as_ref(), &cwd)?;
    check_name_clash(&src.file_name, &stem, &config.formats)?;
    check_destination_is_not_source(&src.path, &archive_path)?;
    let resources = config.resources.anchored_at(&cwd);
    info!(
        "Starting run: {} -> {}",
        src.path.display(),
        archive_path.display()
    );

    // ── Step 2: Collaborators ────────────────────────────────────────────
    let engine = resolve_engine(config);
    let validator = resolve_validator(config);
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    // ── Step 3: Scratch workspace ────────────────────────────────────────
    let workspace = ScratchWorkspace::create()?;
    progress.on_run_start(config.formats.len(), config.validate_formats.len());

    // ── Step 4: Convert each format ──────────────────────────────────────
    let ctx = ConversionContext {
        source: &src,
        stem: &stem,
        workspace: &workspace,
        launch_dir: &launch_dir,
        resources: &resources,
        config,
    };
    let mut conversions = Vec::with_capacity(config.formats.len());
    let mut converted: HashMap<OutputFormat, ConvertedOutput> = HashMap::new();
    for &format in &config.formats {
        progress.on_conversion_start(format);
        let start = Instant::now();
        let status = match convert::convert_format(engine.as_ref(), &ctx, format).await {
            Ok(out) => {
                progress.on_conversion_complete(format, &out.file_name);
                let status = ConversionStatus::Converted {
                    output: out.file_name.clone(),
                    media_dir: out.media_dir.clone(),
                };
                converted.insert(format, out);
                status
            }
            Err(error) => {
                warn!("{}", error);
                progress.on_conversion_error(format, &error);
                ConversionStatus::Failed { error }
            }
        };
        conversions.push(ConversionRecord {
            format,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    // ── Step 5: Validate selected outputs ────────────────────────────────
    let mut validations = Vec::with_capacity(config.validate_formats.len());
    for &format in &config.validate_formats {
        let start = Instant::now();
        let result = match converted.get(&format) {
            Some(out) => {
                validate::validate_output(
                    validator.as_ref(),
                    &out.path,
                    format,
                    &resources,
                    config.validation_timeout_secs,
                )
                .await
            }
            None => Err(FormatError::NotConverted { format }),
        };
        let status = match result {
            Ok(()) => {
                progress.on_validation_complete(format);
                ValidationStatus::Valid
            }
            Err(error) => {
                warn!("{}", error);
                progress.on_validation_error(format, &error);
                ValidationStatus::Failed { error }
            }
        };
        validations.push(ValidationRecord {
            format,
            status,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    // ── Step 6: Package ──────────────────────────────────────────────────
    workspace.copy_source(&src.path, &src.file_name)?;
    let ws_path = workspace.path().to_path_buf();
    let dest = archive_path.clone();
    let archive_entries =
        tokio::task::spawn_blocking(move || archive::build_archive(&ws_path, &dest))
            .await
            .map_err(|e| ConvalidateError::Internal(format!("Archive task panicked: {}", e)))??;
    progress.on_archive_complete(&archive_path, archive_entries.len());

    // ── Step 7: Release the workspace ────────────────────────────────────
    workspace.close()?;

    let report = RunReport {
        source: src.path,
        archive: archive_path,
        conversions,
        validations,
        archive_entries,
        duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Run complete: {} of {} steps failed, {}ms",
        report.errors().count(),
        report.conversions.len() + report.validations.len(),
        report.duration_ms
    );
    Ok(report)
}

/// Synchronous wrapper around [`convalidate`].
///
/// Creates a temporary tokio runtime internally.
pub fn convalidate_sync(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    config: &ConvalidateConfig,
) -> Result<RunReport, ConvalidateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvalidateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convalidate(source, destination, config))
}

/// Describe the configured conversion engine without converting anything.
pub async fn engine_info(config: &ConvalidateConfig) -> Result<EngineInfo, ConvalidateError> {
    let engine = resolve_engine(config);
    engine
        .info()
        .await
        .map_err(|e| ConvalidateError::EngineUnavailable {
            engine: engine.name().to_string(),
            detail: e.to_string(),
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A pre-built engine wins over the configured executable path.
fn resolve_engine(config: &ConvalidateConfig) -> Arc<dyn ConversionEngine> {
    match config.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(PandocEngine::new(config.pandoc_path.clone())),
    }
}

/// A pre-built validator wins over the configured executable path.
fn resolve_validator(config: &ConvalidateConfig) -> Arc<dyn SchemaValidator> {
    match config.validator {
        Some(ref validator) => Arc::clone(validator),
        None => Arc::new(XmllintValidator::new(config.xmllint_path.clone())),
    }
}

/// The source is copied to the archive root next to the outputs, so it must
/// not share a file name with any of them.
fn check_name_clash(
    source_name: &str,
    stem: &str,
    formats: &[OutputFormat],
) -> Result<(), ConvalidateError> {
    match formats
        .iter()
        .find(|f| format!("{}{}", stem, f.extension()) == source_name)
    {
        Some(format) => Err(ConvalidateError::InvalidConfig(format!(
            "Source '{}' has the same name as the {} output; rename the source or the destination",
            source_name, format
        ))),
        None => Ok(()),
    }
}

/// Reject a destination that is the source itself; moving the archive into
/// place would overwrite the document being converted.
fn check_destination_is_not_source(
    source: &Path,
    destination: &Path,
) -> Result<(), ConvalidateError> {
    // A destination that does not exist yet cannot be the existing source.
    let (Ok(source), Ok(destination)) = (source.canonicalize(), destination.canonicalize()) else {
        return Ok(());
    };
    if source == destination {
        return Err(ConvalidateError::InvalidConfig(format!(
            "Destination '{}' is the source document; choose another archive path",
            destination.display()
        )));
    }
    Ok(())
}
