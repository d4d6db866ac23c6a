//! Progress-callback trait for per-format pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::ConvalidateConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts and validates each format and writes the
//! archive.
//!
//! # Example
//!
//! ```rust
//! use convalidator::{ConvalidateConfig, OutputFormat, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_conversion_complete(&self, format: OutputFormat, output_name: &str) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{format} → {output_name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ConvalidateConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::OutputFormat;
use crate::error::FormatError;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline orchestrator as it works through a run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive sequentially from the task driving
/// the run, but implementations must still be `Send + Sync` because the
/// config that carries them is shared.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first conversion.
    ///
    /// # Arguments
    /// * `conversions`: number of formats that will be converted
    /// * `validations`: number of formats that will be validated
    fn on_run_start(&self, conversions: usize, validations: usize) {
        let _ = (conversions, validations);
    }

    /// Called just before the engine is invoked for `format`.
    fn on_conversion_start(&self, format: OutputFormat) {
        let _ = format;
    }

    /// Called when `format` was converted.
    ///
    /// `output_name` is the file name of the output inside the archive.
    fn on_conversion_complete(&self, format: OutputFormat, output_name: &str) {
        let _ = (format, output_name);
    }

    /// Called when converting `format` failed. The run continues.
    fn on_conversion_error(&self, format: OutputFormat, error: &FormatError) {
        let _ = (format, error);
    }

    /// Called when the output of `format` passed validation.
    fn on_validation_complete(&self, format: OutputFormat) {
        let _ = format;
    }

    /// Called when validating `format` failed or was skipped. The run continues.
    fn on_validation_error(&self, format: OutputFormat, error: &FormatError) {
        let _ = (format, error);
    }

    /// Called once the archive is in place at `destination`.
    fn on_archive_complete(&self, destination: &Path, entries: usize) {
        let _ = (destination, entries);
    }
}

/// Convenience type alias for the boxed callback stored in
/// [`crate::config::ConvalidateConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

/// A no-op callback used when none is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}
