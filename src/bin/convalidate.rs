//! CLI binary for convalidator.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConvalidateConfig`, runs the pipeline and prints the report.
//!
//! Exit status: `0` when every conversion and validation succeeded, `2`
//! when the archive was written but some format failed, `1` on a fatal
//! error (no archive).

use anyhow::{Context, Result};
use clap::Parser;
use convalidator::{
    convalidate, engine_info, ConvalidateConfig, FormatError, OutputFormat,
    PipelineProgressCallback, ProgressCallback, ResourceLayout, RunReport, DEFAULT_PUBLISHER,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar step per conversion and per
/// validation, with a log line for each finished step.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking source…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn step_failed(&self, verb: &str, format: OutputFormat, error: &FormatError) {
        let msg = error.to_string();
        // Truncate very long messages to keep output tidy.
        let msg = match msg.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &msg[..idx]),
            None => msg,
        };
        self.bar.println(format!(
            "  {} {:<8} {:<5} {}",
            red("✗"),
            verb,
            format.name(),
            red(&msg)
        ));
        self.bar.inc(1);
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, conversions: usize, validations: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos}/{len} steps  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length((conversions + validations) as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Running");
    }

    fn on_conversion_start(&self, format: OutputFormat) {
        self.bar.set_message(format!("converting to {format}"));
    }

    fn on_conversion_complete(&self, format: OutputFormat, output_name: &str) {
        self.bar.println(format!(
            "  {} {:<8} {:<5} {}",
            green("✓"),
            "convert",
            format.name(),
            dim(output_name)
        ));
        self.bar.inc(1);
    }

    fn on_conversion_error(&self, format: OutputFormat, error: &FormatError) {
        self.step_failed("convert", format, error);
    }

    fn on_validation_complete(&self, format: OutputFormat) {
        self.bar.println(format!(
            "  {} {:<8} {:<5} {}",
            green("✓"),
            "validate",
            format.name(),
            dim("valid")
        ));
        self.bar.inc(1);
    }

    fn on_validation_error(&self, format: OutputFormat, error: &FormatError) {
        self.step_failed("validate", format, error);
    }

    fn on_archive_complete(&self, destination: &Path, entries: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(&destination.display().to_string()),
            dim(&format!("{entries} entries"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # TEI + HTML, TEI validated (the defaults)
  convalidate paper.md paper.dhc

  # Resources from a data directory, citations processed
  convalidate --data-dir /usr/share/convalidator --citeproc paper.md out/paper.dhc

  # Add a PDF with narrow margins
  convalidate -f tei,html,pdf --extra-arg pdf=--variable=geometry:margin=1.5cm paper.md paper.dhc

  # Conversion only, JSON report on stdout
  convalidate --no-validate --json paper.md paper.dhc > report.json

  # Which pandoc will be used?
  convalidate --engine-info

DATA DIRECTORY LAYOUT:
  template/mdconvalidator_tei.xml     TEI template
  template/mdconvalidator.html        HTML template
  csl/digital_humanities_abstracts.csl
  schema/dhconvalidator.xsd           schema for TEI validation

EXIT STATUS:
  0  all conversions and validations succeeded
  2  archive written, but at least one format failed
  1  fatal error, no archive written
"#;

/// Convert a document to several formats, validate and package the results.
#[derive(Parser, Debug)]
#[command(
    name = "convalidate",
    version,
    about = "Convert a document to TEI/HTML/PDF, validate, and package the results",
    long_about = "Convert one source document (usually Markdown) into each requested output \
format with pandoc, validate structured outputs against their XML schema with xmllint, and \
zip the outputs, their extracted media and the source into a single archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source document.
    #[arg(required_unless_present = "engine_info")]
    source: Option<PathBuf>,

    /// Archive to write.
    #[arg(required_unless_present = "engine_info")]
    destination: Option<PathBuf>,

    /// Output formats to produce (comma-separated or repeated).
    #[arg(short, long = "format", env = "CONVALIDATE_FORMATS", value_enum, value_delimiter = ',')]
    formats: Vec<FormatArg>,

    /// Formats to validate against their schema. Default: tei.
    #[arg(long, env = "CONVALIDATE_VALIDATE", value_enum, value_delimiter = ',')]
    validate: Vec<FormatArg>,

    /// Skip validation entirely.
    #[arg(long, conflicts_with = "validate")]
    no_validate: bool,

    /// Extra engine argument for one format, as FORMAT=ARG (repeatable).
    #[arg(long = "extra-arg", value_name = "FORMAT=ARG", value_parser = parse_extra_arg)]
    extra_args: Vec<(OutputFormat, String)>,

    /// Run citation processing.
    #[arg(long, env = "CONVALIDATE_CITEPROC")]
    citeproc: bool,

    /// Publisher metadata passed to every template.
    #[arg(long, env = "CONVALIDATE_PUBLISHER", default_value = DEFAULT_PUBLISHER)]
    publisher: String,

    /// Directory holding template/, csl/ and schema/.
    #[arg(long, env = "CONVALIDATE_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// pandoc executable.
    #[arg(long, env = "CONVALIDATE_PANDOC", default_value = "pandoc")]
    pandoc: PathBuf,

    /// xmllint executable.
    #[arg(long, env = "CONVALIDATE_XMLLINT", default_value = "xmllint")]
    xmllint: PathBuf,

    /// Base name for the transient media directory.
    #[arg(long, env = "CONVALIDATE_MEDIA_DIR_BASE", default_value = "Pictures")]
    media_dir_base: String,

    /// Per-conversion timeout in seconds.
    #[arg(long, env = "CONVALIDATE_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Per-validation timeout in seconds.
    #[arg(long, env = "CONVALIDATE_VALIDATION_TIMEOUT", default_value_t = 60)]
    validation_timeout: u64,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "CONVALIDATE_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "CONVALIDATE_NO_PROGRESS")]
    no_progress: bool,

    /// Print conversion engine details and exit.
    #[arg(long)]
    engine_info: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CONVALIDATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CONVALIDATE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Tei,
    Html,
    Pdf,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Tei => OutputFormat::Tei,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Pdf => OutputFormat::Pdf,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each step; keep library logs quiet
    // while it is on screen.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.engine_info;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Engine-info mode ─────────────────────────────────────────────────
    if cli.engine_info {
        let info = engine_info(&config)
            .await
            .context("Failed to query conversion engine")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise engine info")?
            );
        } else {
            println!("Engine:   {}", info.name);
            println!("Version:  {}", info.version);
            println!("Path:     {}", info.path.display());
            println!("Formats:  {}", info.output_formats.join(", "));
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let (Some(source), Some(destination)) = (cli.source.as_ref(), cli.destination.as_ref()) else {
        anyhow::bail!("SOURCE and DESTINATION are required");
    };
    let report = convalidate(source, destination, &config)
        .await
        .context("Run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report, show_progress);
    }

    Ok(if report.has_failures() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(report: &RunReport, show_progress: bool) {
    // Without the bar nothing has been printed per step yet.
    if !show_progress {
        eprintln!("{report}");
    }
    let failed = report.errors().count();
    let total = report.conversions.len() + report.validations.len();
    if failed == 0 {
        eprintln!(
            "{}  {} steps  {}ms  →  {}",
            green("✔"),
            total,
            report.duration_ms,
            bold(&report.archive.display().to_string())
        );
    } else {
        eprintln!(
            "{}  {}/{} steps failed  {}ms  →  {}",
            if failed == total { red("✘") } else { cyan("⚠") },
            red(&failed.to_string()),
            total,
            report.duration_ms,
            bold(&report.archive.display().to_string())
        );
    }
}

/// Map CLI args to `ConvalidateConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConvalidateConfig> {
    let mut builder = ConvalidateConfig::builder()
        .use_citeproc(cli.citeproc)
        .publisher(cli.publisher.clone())
        .resources(ResourceLayout::from_data_dir(&cli.data_dir))
        .pandoc_path(cli.pandoc.clone())
        .xmllint_path(cli.xmllint.clone())
        .media_dir_base(cli.media_dir_base.clone())
        .conversion_timeout_secs(cli.timeout)
        .validation_timeout_secs(cli.validation_timeout);

    if !cli.formats.is_empty() {
        builder = builder.formats(cli.formats.iter().map(|&f| f.into()));
    }
    if cli.no_validate {
        builder = builder.validate_formats(Vec::new());
    } else if !cli.validate.is_empty() {
        builder = builder.validate_formats(cli.validate.iter().map(|&f| f.into()));
    }
    for (format, arg) in &cli.extra_args {
        builder = builder.extra_args(*format, [arg.clone()]);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--extra-arg FORMAT=ARG`. Only the first `=` separates, so the
/// argument itself may contain more.
fn parse_extra_arg(s: &str) -> Result<(OutputFormat, String), String> {
    let (format, arg) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FORMAT=ARG, got '{s}'"))?;
    let format: OutputFormat = format.parse().map_err(|e| format!("{e}"))?;
    if arg.is_empty() {
        return Err(format!("empty argument for {format}"));
    }
    Ok((format, arg.to_string()))
}
