//! Configuration types for a convert-validate-package run.
//!
//! All run behaviour is controlled through [`ConvalidateConfig`], built via
//! its [`ConvalidateConfigBuilder`]. Every setting that used to be a global
//! constant (publisher metadata, engine location, resource files) lives here
//! so two runs can differ without touching process-wide state.

use crate::engine::ConversionEngine;
use crate::error::ConvalidateError;
use crate::progress::PipelineProgressCallback;
use crate::validator::SchemaValidator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Publisher metadata applied to every conversion unless overridden.
pub const DEFAULT_PUBLISHER: &str = "Frederik Elwert, Ruhr University Bochum";

/// Base name probed for the transient media-extraction directory.
pub const DEFAULT_MEDIA_DIR_BASE: &str = "Pictures";

/// Configuration for one convert-validate-package run.
///
/// Built via [`ConvalidateConfig::builder()`] or using
/// [`ConvalidateConfig::default()`].
///
/// # Example
/// ```rust
/// use convalidator::{ConvalidateConfig, OutputFormat};
///
/// let config = ConvalidateConfig::builder()
///     .formats([OutputFormat::Tei, OutputFormat::Html])
///     .validate_formats([OutputFormat::Tei])
///     .publisher("Example Press")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConvalidateConfig {
    /// Output formats to produce, in conversion order. Default: tei, html.
    pub formats: Vec<OutputFormat>,

    /// Formats whose output is checked against a registered schema. Default: tei.
    ///
    /// A format listed here but missing from `formats` is reported as a
    /// validation failure, not rejected.
    pub validate_formats: Vec<OutputFormat>,

    /// Extra engine arguments, applied only when converting the keyed format.
    ///
    /// Typical use is page geometry for PDF: `["-V", "geometry:margin=1.5cm"]`.
    pub extra_args: HashMap<OutputFormat, Vec<String>>,

    /// Run the citation-processing filter stage. Default: false.
    pub use_citeproc: bool,

    /// Filter name used when `use_citeproc` is set. Default: `citeproc`
    /// (pandoc's built-in processor).
    pub citeproc_filter: String,

    /// Publisher metadata passed as a template variable to every conversion.
    pub publisher: String,

    /// Templates, bibliography style and schemas.
    pub resources: ResourceLayout,

    /// Path or name of the pandoc executable. Default: `pandoc`.
    pub pandoc_path: PathBuf,

    /// Path or name of the xmllint executable. Default: `xmllint`.
    pub xmllint_path: PathBuf,

    /// Pre-constructed conversion engine. Takes precedence over `pandoc_path`.
    pub engine: Option<Arc<dyn ConversionEngine>>,

    /// Pre-constructed schema validator. Takes precedence over `xmllint_path`.
    pub validator: Option<Arc<dyn SchemaValidator>>,

    /// Directory the engine runs in, where transient media directories appear.
    /// If None, the process working directory at run start.
    pub launch_dir: Option<PathBuf>,

    /// Base name for the media-extraction directory. Default: `Pictures`.
    pub media_dir_base: String,

    /// Upper bound for a single engine invocation in seconds. Default: 300.
    pub conversion_timeout_secs: u64,

    /// Upper bound for a single validation in seconds. Default: 60.
    pub validation_timeout_secs: u64,

    /// Optional per-format progress events.
    pub progress_callback: Option<Arc<dyn PipelineProgressCallback>>,
}

impl Default for ConvalidateConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Tei, OutputFormat::Html],
            validate_formats: vec![OutputFormat::Tei],
            extra_args: HashMap::new(),
            use_citeproc: false,
            citeproc_filter: "citeproc".to_string(),
            publisher: DEFAULT_PUBLISHER.to_string(),
            resources: ResourceLayout::from_data_dir("."),
            pandoc_path: PathBuf::from("pandoc"),
            xmllint_path: PathBuf::from("xmllint"),
            engine: None,
            validator: None,
            launch_dir: None,
            media_dir_base: DEFAULT_MEDIA_DIR_BASE.to_string(),
            conversion_timeout_secs: 300,
            validation_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConvalidateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvalidateConfig")
            .field("formats", &self.formats)
            .field("validate_formats", &self.validate_formats)
            .field("extra_args", &self.extra_args)
            .field("use_citeproc", &self.use_citeproc)
            .field("citeproc_filter", &self.citeproc_filter)
            .field("publisher", &self.publisher)
            .field("resources", &self.resources)
            .field("pandoc_path", &self.pandoc_path)
            .field("xmllint_path", &self.xmllint_path)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("validator", &self.validator.as_ref().map(|v| v.name().to_string()))
            .field("launch_dir", &self.launch_dir)
            .field("media_dir_base", &self.media_dir_base)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("validation_timeout_secs", &self.validation_timeout_secs)
            .finish()
    }
}

impl ConvalidateConfig {
    /// Create a new builder for `ConvalidateConfig`.
    pub fn builder() -> ConvalidateConfigBuilder {
        ConvalidateConfigBuilder {
            config: Self::default(),
        }
    }

    /// Extra arguments registered for `format`, empty when none are.
    pub fn extra_args_for(&self, format: OutputFormat) -> &[String] {
        self.extra_args
            .get(&format)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Builder for [`ConvalidateConfig`].
pub struct ConvalidateConfigBuilder {
    config: ConvalidateConfig,
}

impl fmt::Debug for ConvalidateConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvalidateConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConvalidateConfigBuilder {
    /// Replace the requested output formats. Duplicates are dropped, first one wins.
    pub fn formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.config.formats = dedup(formats);
        self
    }

    pub fn validate_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.config.validate_formats = dedup(formats);
        self
    }

    /// Register extra engine arguments for one format, appending to any already set.
    pub fn extra_args<I, S>(mut self, format: OutputFormat, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .extra_args
            .entry(format)
            .or_default()
            .extend(args.into_iter().map(Into::into));
        self
    }

    pub fn use_citeproc(mut self, v: bool) -> Self {
        self.config.use_citeproc = v;
        self
    }

    pub fn citeproc_filter(mut self, name: impl Into<String>) -> Self {
        self.config.citeproc_filter = name.into();
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.config.publisher = publisher.into();
        self
    }

    pub fn resources(mut self, resources: ResourceLayout) -> Self {
        self.config.resources = resources;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn xmllint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.xmllint_path = path.into();
        self
    }

    pub fn engine(mut self, engine: Arc<dyn ConversionEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.config.validator = Some(validator);
        self
    }

    pub fn launch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.launch_dir = Some(dir.into());
        self
    }

    pub fn media_dir_base(mut self, base: impl Into<String>) -> Self {
        self.config.media_dir_base = base.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs.max(1);
        self
    }

    pub fn validation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.validation_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PipelineProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConvalidateConfig, ConvalidateError> {
        let c = &self.config;
        if c.formats.is_empty() {
            return Err(ConvalidateError::InvalidConfig(
                "At least one output format is required".into(),
            ));
        }
        let base = c.media_dir_base.as_str();
        if base.is_empty() || base.contains(['/', '\\']) || base == "." || base == ".." {
            return Err(ConvalidateError::InvalidConfig(format!(
                "Media directory base must be a plain directory name, got '{}'",
                base
            )));
        }
        if c.use_citeproc && c.citeproc_filter.trim().is_empty() {
            return Err(ConvalidateError::InvalidConfig(
                "Citation processing requested but no filter name set".into(),
            ));
        }
        Ok(self.config)
    }
}

fn dedup(formats: impl IntoIterator<Item = OutputFormat>) -> Vec<OutputFormat> {
    let mut out: Vec<OutputFormat> = Vec::new();
    for f in formats {
        if !out.contains(&f) {
            out.push(f);
        }
    }
    out
}

// ── Output formats ───────────────────────────────────────────────────────

/// A target document format the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// TEI XML.
    Tei,
    /// Standalone HTML page.
    Html,
    /// Fixed-layout PDF, typeset through LaTeX.
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Tei, OutputFormat::Html, OutputFormat::Pdf];

    /// Canonical lowercase name, as used on the command line and in reports.
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Tei => "tei",
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// File extension (with leading dot) of a converted output.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Tei => ".xml",
            OutputFormat::Html => ".html",
            OutputFormat::Pdf => ".pdf",
        }
    }

    /// Pandoc writer that produces this format.
    pub fn pandoc_writer(self) -> &'static str {
        match self {
            OutputFormat::Tei => "tei",
            OutputFormat::Html => "html",
            // pandoc renders PDF from the LaTeX writer when the output ends in .pdf
            OutputFormat::Pdf => "latex",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvalidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tei" => Ok(OutputFormat::Tei),
            "html" => Ok(OutputFormat::Html),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(ConvalidateError::InvalidConfig(format!(
                "Unknown output format '{}' (expected tei, html or pdf)",
                other
            ))),
        }
    }
}

// ── Resource layout ──────────────────────────────────────────────────────

/// Template, bibliography-style and schema files consumed by a run.
///
/// Relative paths are resolved against the process working directory once,
/// when the run starts, so the engine sees absolute paths no matter which
/// directory it executes in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLayout {
    /// Format-specific engine templates. Formats without one use the engine default.
    pub templates: HashMap<OutputFormat, PathBuf>,
    /// Citation style applied to every conversion.
    pub csl: Option<PathBuf>,
    /// Structural schemas, only needed for formats that are validated.
    pub schemas: HashMap<OutputFormat, PathBuf>,
}

impl ResourceLayout {
    /// The conventional layout below a data directory:
    ///
    /// ```text
    /// <dir>/template/mdconvalidator_tei.xml
    /// <dir>/template/mdconvalidator.html
    /// <dir>/csl/digital_humanities_abstracts.csl
    /// <dir>/schema/dhconvalidator.xsd
    /// ```
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();
        templates.insert(
            OutputFormat::Tei,
            dir.join("template").join("mdconvalidator_tei.xml"),
        );
        templates.insert(
            OutputFormat::Html,
            dir.join("template").join("mdconvalidator.html"),
        );
        let mut schemas = HashMap::new();
        schemas.insert(OutputFormat::Tei, dir.join("schema").join("dhconvalidator.xsd"));
        Self {
            templates,
            csl: Some(dir.join("csl").join("digital_humanities_abstracts.csl")),
            schemas,
        }
    }

    pub fn with_template(mut self, format: OutputFormat, path: impl Into<PathBuf>) -> Self {
        self.templates.insert(format, path.into());
        self
    }

    pub fn with_schema(mut self, format: OutputFormat, path: impl Into<PathBuf>) -> Self {
        self.schemas.insert(format, path.into());
        self
    }

    pub fn with_csl(mut self, path: impl Into<PathBuf>) -> Self {
        self.csl = Some(path.into());
        self
    }

    /// Copy of this layout with every relative path joined onto `base`.
    pub fn anchored_at(&self, base: &Path) -> Self {
        let anchor = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            templates: self.templates.iter().map(|(f, p)| (*f, anchor(p))).collect(),
            csl: self.csl.as_ref().map(anchor),
            schemas: self.schemas.iter().map(|(f, p)| (*f, anchor(p))).collect(),
        }
    }
}
