//! Format conversion: one engine call per requested output format.
//!
//! Every call gets the same fixed arguments (standalone output, citation
//! style, publisher metadata, resource path at the source's directory) plus
//! whatever is registered for that format alone: a template and extra
//! arguments. Media extraction is scoped by a [`MediaDirLease`], so the
//! launch directory is clean again when this returns, whatever the outcome.

use crate::config::{ConvalidateConfig, OutputFormat, ResourceLayout};
use crate::engine::{ConversionEngine, EngineRequest};
use crate::error::FormatError;
use crate::pipeline::input::ResolvedSource;
use crate::pipeline::media::MediaDirLease;
use crate::pipeline::workspace::ScratchWorkspace;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a conversion needs that does not change between formats.
#[derive(Debug)]
pub struct ConversionContext<'a> {
    pub source: &'a ResolvedSource,
    /// Base name shared by all outputs (the destination archive's stem).
    pub stem: &'a str,
    pub workspace: &'a ScratchWorkspace,
    /// Directory the engine runs in.
    pub launch_dir: &'a Path,
    /// Resource files with absolute paths.
    pub resources: &'a ResourceLayout,
    pub config: &'a ConvalidateConfig,
}

/// A successfully converted format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedOutput {
    pub path: PathBuf,
    /// File name at the workspace root.
    pub file_name: String,
    /// Media directory this conversion relocated, if it extracted any.
    pub media_dir: Option<String>,
}

/// Assemble the engine invocation for `format`.
///
/// `media_dir` is the directory name the engine should extract media into,
/// relative to the launch directory.
pub fn build_request(
    ctx: &ConversionContext<'_>,
    format: OutputFormat,
    media_dir: &str,
) -> EngineRequest {
    let mut args = vec![
        "--standalone".to_string(),
        format!("--extract-media={}", media_dir),
    ];
    if let Some(csl) = &ctx.resources.csl {
        args.push(format!("--csl={}", csl.display()));
    }
    args.push(format!("--variable=publisher:{}", ctx.config.publisher));
    args.push(format!("--resource-path={}", ctx.source.basedir.display()));
    args.extend(ctx.config.extra_args_for(format).iter().cloned());
    if let Some(template) = ctx.resources.templates.get(&format) {
        args.push(format!("--template={}", template.display()));
    }

    let filters = if ctx.config.use_citeproc {
        vec![ctx.config.citeproc_filter.clone()]
    } else {
        Vec::new()
    };

    EngineRequest {
        input: ctx.source.path.clone(),
        format,
        args,
        filters,
        output: ctx.workspace.output_path(ctx.stem, format),
        working_dir: ctx.launch_dir.to_path_buf(),
    }
}

/// Convert the source into `format`, relocating any extracted media.
///
/// On failure nothing of this format is left in the workspace: an output
/// the engine wrote before failing or timing out is removed, so it cannot
/// end up in the archive.
pub async fn convert_format(
    engine: &dyn ConversionEngine,
    ctx: &ConversionContext<'_>,
    format: OutputFormat,
) -> Result<ConvertedOutput, FormatError> {
    let lease = MediaDirLease::acquire(ctx.launch_dir, &ctx.config.media_dir_base);
    let request = build_request(ctx, format, lease.name());
    info!("Converting to {} with {}", format, engine.name());
    debug!("{} args: {:?} filters: {:?}", format, request.args, request.filters);

    match run_engine(engine, &request, &lease, ctx).await {
        Ok(media_dir) => {
            let file_name = request
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!("{} written to {}", format, request.output.display());
            Ok(ConvertedOutput {
                path: request.output,
                file_name,
                media_dir,
            })
        }
        Err(e) => {
            discard_output(&request.output);
            Err(e)
        }
    }
}

async fn run_engine(
    engine: &dyn ConversionEngine,
    request: &EngineRequest,
    lease: &MediaDirLease,
    ctx: &ConversionContext<'_>,
) -> Result<Option<String>, FormatError> {
    let format = request.format;
    let secs = ctx.config.conversion_timeout_secs;
    match tokio::time::timeout(Duration::from_secs(secs), engine.convert_file(request)).await {
        Err(_) => return Err(FormatError::ConversionTimeout { format, secs }),
        Ok(Err(e)) => {
            return Err(FormatError::ConversionFailed {
                format,
                cause: e.to_string(),
            })
        }
        Ok(Ok(())) => {}
    }

    if !request.output.is_file() {
        return Err(FormatError::ConversionFailed {
            format,
            cause: format!("engine produced no output at '{}'", request.output.display()),
        });
    }

    lease
        .relocate(ctx.workspace.path())
        .map_err(|e| FormatError::MediaRelocationFailed {
            format,
            cause: e.to_string(),
        })
}

/// Remove whatever a failed conversion left at `output`.
fn discard_output(output: &Path) {
    let removed = if output.is_dir() {
        fs::remove_dir_all(output)
    } else {
        fs::remove_file(output)
    };
    match removed {
        Ok(()) => debug!("Discarded partial output {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to discard partial output {}: {}", output.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineInfo};
    use async_trait::async_trait;

    /// Writes the output and, when asked to, a media file. With `partial`
    /// the output is written before hanging or failing.
    struct ScriptedEngine {
        extract: bool,
        fail: bool,
        hang: bool,
        partial: bool,
    }

    #[async_trait]
    impl ConversionEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn convert_file(&self, request: &EngineRequest) -> Result<(), EngineError> {
            if self.extract {
                let media = request
                    .working_dir
                    .join(request.arg_value("extract-media").unwrap());
                std::fs::create_dir_all(&media).unwrap();
                std::fs::write(media.join("figure.png"), b"png").unwrap();
            }
            if self.partial {
                std::fs::write(&request.output, "<TEI").unwrap();
            }
            if self.hang {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.fail {
                return Err(EngineError::Failed {
                    status: Some(64),
                    stderr: "template error".into(),
                });
            }
            std::fs::write(&request.output, "<TEI/>").unwrap();
            Ok(())
        }

        async fn info(&self) -> Result<EngineInfo, EngineError> {
            Err(EngineError::Other("n/a".into()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: ResolvedSource,
        launch: PathBuf,
        workspace: ScratchWorkspace,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let launch = dir.path().join("launch");
        std::fs::create_dir(&docs).unwrap();
        std::fs::create_dir(&launch).unwrap();
        std::fs::write(docs.join("paper.md"), "# Paper\n\n![fig](fig.png)\n").unwrap();
        let source = ResolvedSource {
            path: docs.join("paper.md"),
            basedir: docs,
            file_name: "paper.md".into(),
        };
        Fixture {
            _dir: dir,
            source,
            launch,
            workspace: ScratchWorkspace::create().unwrap(),
        }
    }

    fn ctx<'a>(
        fx: &'a Fixture,
        resources: &'a ResourceLayout,
        config: &'a ConvalidateConfig,
    ) -> ConversionContext<'a> {
        ConversionContext {
            source: &fx.source,
            stem: "paper",
            workspace: &fx.workspace,
            launch_dir: &fx.launch,
            resources,
            config,
        }
    }

    #[test]
    fn request_arguments_in_order() {
        let fx = fixture();
        let resources = ResourceLayout::default()
            .with_template(OutputFormat::Pdf, "/data/template/pdf.tex")
            .with_csl("/data/csl/style.csl");
        let config = ConvalidateConfig::builder()
            .publisher("Example Press")
            .extra_args(OutputFormat::Pdf, ["-V", "geometry:margin=1.5cm"])
            .use_citeproc(true)
            .build()
            .unwrap();
        let ctx = ctx(&fx, &resources, &config);

        let req = build_request(&ctx, OutputFormat::Pdf, "Pictures");
        assert_eq!(
            req.args,
            vec![
                "--standalone".to_string(),
                "--extract-media=Pictures".into(),
                "--csl=/data/csl/style.csl".into(),
                "--variable=publisher:Example Press".into(),
                format!("--resource-path={}", fx.source.basedir.display()),
                "-V".into(),
                "geometry:margin=1.5cm".into(),
                "--template=/data/template/pdf.tex".into(),
            ]
        );
        assert_eq!(req.filters, vec!["citeproc".to_string()]);
        assert_eq!(req.output, fx.workspace.path().join("paper.pdf"));
        assert_eq!(req.working_dir, fx.launch);
    }

    #[test]
    fn extra_args_and_templates_stay_with_their_format() {
        let fx = fixture();
        let resources = ResourceLayout::default().with_template(OutputFormat::Tei, "/t/tei.xml");
        let config = ConvalidateConfig::builder()
            .extra_args(OutputFormat::Pdf, ["-V", "geometry:margin=1.5cm"])
            .build()
            .unwrap();
        let ctx = ctx(&fx, &resources, &config);

        let req = build_request(&ctx, OutputFormat::Html, "Pictures");
        assert!(!req.args.iter().any(|a| a.starts_with("geometry")));
        assert_eq!(req.arg_value("template"), None);
        assert!(req.filters.is_empty());
    }

    #[tokio::test]
    async fn converts_and_relocates_media() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::default();
        let ctx = ctx(&fx, &resources, &config);
        let engine = ScriptedEngine {
            extract: true,
            fail: false,
            hang: false,
            partial: false,
        };

        let out = convert_format(&engine, &ctx, OutputFormat::Tei).await.unwrap();
        assert_eq!(out.file_name, "paper.xml");
        assert_eq!(out.media_dir.as_deref(), Some("Pictures"));
        assert!(fx.workspace.path().join("Pictures/figure.png").is_file());
        assert_eq!(std::fs::read_dir(&fx.launch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_conversion_still_cleans_launch_dir() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::default();
        let ctx = ctx(&fx, &resources, &config);
        let engine = ScriptedEngine {
            extract: true,
            fail: true,
            hang: false,
            partial: false,
        };

        let err = convert_format(&engine, &ctx, OutputFormat::Tei)
            .await
            .unwrap_err();
        assert!(matches!(err, FormatError::ConversionFailed { .. }), "got: {err}");
        assert!(err.to_string().contains("template error"));
        assert_eq!(std::fs::read_dir(&fx.launch).unwrap().count(), 0);
        assert!(!fx.workspace.path().join("Pictures").exists());
    }

    #[tokio::test]
    async fn hanging_engine_times_out() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::builder()
            .conversion_timeout_secs(1)
            .build()
            .unwrap();
        let ctx = ctx(&fx, &resources, &config);
        let engine = ScriptedEngine {
            extract: true,
            fail: false,
            hang: true,
            partial: false,
        };

        let err = convert_format(&engine, &ctx, OutputFormat::Html)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FormatError::ConversionTimeout {
                format: OutputFormat::Html,
                secs: 1
            }
        );
        assert_eq!(std::fs::read_dir(&fx.launch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn output_written_before_a_failure_is_discarded() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::default();
        let ctx = ctx(&fx, &resources, &config);
        let engine = ScriptedEngine {
            extract: true,
            fail: true,
            hang: false,
            partial: true,
        };

        let err = convert_format(&engine, &ctx, OutputFormat::Tei)
            .await
            .unwrap_err();
        assert!(matches!(err, FormatError::ConversionFailed { .. }), "got: {err}");
        assert_eq!(std::fs::read_dir(fx.workspace.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&fx.launch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn output_written_before_a_timeout_is_discarded() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::builder()
            .conversion_timeout_secs(1)
            .build()
            .unwrap();
        let ctx = ctx(&fx, &resources, &config);
        let engine = ScriptedEngine {
            extract: false,
            fail: false,
            hang: true,
            partial: true,
        };

        let err = convert_format(&engine, &ctx, OutputFormat::Tei)
            .await
            .unwrap_err();
        assert!(matches!(err, FormatError::ConversionTimeout { .. }), "got: {err}");
        assert!(!fx.workspace.path().join("paper.xml").exists());
    }

    /// Extracts a dangling link, which cannot be copied into the workspace.
    #[cfg(unix)]
    struct DanglingMediaEngine;

    #[cfg(unix)]
    #[async_trait]
    impl ConversionEngine for DanglingMediaEngine {
        fn name(&self) -> &str {
            "dangling"
        }

        async fn convert_file(&self, request: &EngineRequest) -> Result<(), EngineError> {
            let media = request
                .working_dir
                .join(request.arg_value("extract-media").unwrap());
            std::fs::create_dir_all(&media).unwrap();
            std::fs::write(media.join("a.png"), b"png").unwrap();
            std::os::unix::fs::symlink(media.join("gone.png"), media.join("b.png")).unwrap();
            std::fs::write(&request.output, "<TEI/>").unwrap();
            Ok(())
        }

        async fn info(&self) -> Result<EngineInfo, EngineError> {
            Err(EngineError::Other("n/a".into()))
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_relocation_discards_the_output() {
        let fx = fixture();
        let resources = ResourceLayout::default();
        let config = ConvalidateConfig::default();
        let ctx = ctx(&fx, &resources, &config);

        let err = convert_format(&DanglingMediaEngine, &ctx, OutputFormat::Tei)
            .await
            .unwrap_err();
        assert!(matches!(err, FormatError::MediaRelocationFailed { .. }), "got: {err}");
        assert_eq!(std::fs::read_dir(fx.workspace.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&fx.launch).unwrap().count(), 0);
    }
}
