//! # convalidator
//!
//! Convert one authored document into several target formats, validate
//! the structured outputs against their schema, and package everything
//! into a single reproducible archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paper.md
//!  │
//!  ├─ 1. Input      resolve and check the source document
//!  ├─ 2. Convert    one engine call per format (pandoc), media extracted
//!  │                into a collision-free directory and moved aside
//!  ├─ 3. Validate   selected outputs against their XSD (xmllint)
//!  └─ 4. Package    source + outputs + media → zip, moved into place atomically
//! ```
//!
//! A failure converting or validating one format is recorded in the
//! [`RunReport`] and never stops the others; the archive is produced as long
//! as the scratch workspace and the destination are usable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convalidator::{convalidate, ConvalidateConfig, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConvalidateConfig::builder()
//!         .formats([OutputFormat::Tei, OutputFormat::Html])
//!         .validate_formats([OutputFormat::Tei])
//!         .build()?;
//!     let report = convalidate("paper.md", "paper.dhc", &config).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convalidate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! convalidator = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! The default collaborators shell out to `pandoc` and `xmllint`. Both can be
//! pointed elsewhere through the config, or replaced entirely by implementing
//! [`ConversionEngine`] / [`SchemaValidator`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convalidate;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod validator;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConvalidateConfig, ConvalidateConfigBuilder, OutputFormat, ResourceLayout, DEFAULT_PUBLISHER,
};
pub use convalidate::{convalidate, convalidate_sync, engine_info};
pub use engine::{ConversionEngine, EngineError, EngineInfo, EngineRequest, PandocEngine};
pub use error::{ConvalidateError, FailureKind, FormatError};
pub use output::{
    ConversionRecord, ConversionStatus, RunReport, ValidationRecord, ValidationStatus,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use validator::{SchemaValidator, SchemaViolation, ValidatorError, XmllintValidator};
