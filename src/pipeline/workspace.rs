//! Scratch workspace: the directory that becomes the archive.
//!
//! Backed by a [`TempDir`], so the directory disappears when the
//! workspace is dropped on any exit path, including an early `?` return or
//! a panic. [`ScratchWorkspace::close`] is the explicit variant that
//! surfaces cleanup failures instead of ignoring them.

use crate::config::OutputFormat;
use crate::error::ConvalidateError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Exclusively-owned scratch directory for one run.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh workspace in the system temp directory.
    pub fn create() -> Result<Self, ConvalidateError> {
        let dir = tempfile::Builder::new()
            .prefix("convalidate-")
            .tempdir()
            .map_err(|e| ConvalidateError::Resource {
                action: "create scratch workspace in",
                path: std::env::temp_dir(),
                source: e,
            })?;
        debug!("Created scratch workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the converted output for `format` goes: `<stem><extension>`.
    pub fn output_path(&self, stem: &str, format: OutputFormat) -> PathBuf {
        self.dir
            .path()
            .join(format!("{}{}", stem, format.extension()))
    }

    /// Copy the original source document to the workspace root.
    pub fn copy_source(&self, source: &Path, file_name: &str) -> Result<PathBuf, ConvalidateError> {
        let dest = self.dir.path().join(file_name);
        std::fs::copy(source, &dest).map_err(|e| ConvalidateError::Packaging {
            path: source.to_path_buf(),
            detail: format!("cannot copy source into workspace: {}", e),
        })?;
        Ok(dest)
    }

    /// Delete the workspace, reporting failure.
    pub fn close(self) -> Result<(), ConvalidateError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| ConvalidateError::Resource {
            action: "remove scratch workspace",
            path: path.clone(),
            source: e,
        })?;
        debug!("Removed scratch workspace {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_share_the_stem() {
        let ws = ScratchWorkspace::create().unwrap();
        assert_eq!(
            ws.output_path("paper", OutputFormat::Tei),
            ws.path().join("paper.xml")
        );
        assert_eq!(
            ws.output_path("paper", OutputFormat::Html),
            ws.path().join("paper.html")
        );
    }

    #[test]
    fn close_removes_directory() {
        let ws = ScratchWorkspace::create().unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(path.join("x.txt"), "x").unwrap();
        ws.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let path = {
            let ws = ScratchWorkspace::create().unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn copy_source_keeps_file_name() {
        let src_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("paper.md");
        std::fs::write(&src, "# Hello\n").unwrap();

        let ws = ScratchWorkspace::create().unwrap();
        let copied = ws.copy_source(&src, "paper.md").unwrap();
        assert_eq!(copied, ws.path().join("paper.md"));
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "# Hello\n");
    }
}
