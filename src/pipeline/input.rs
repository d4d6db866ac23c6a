//! Input resolution: normalise the user-supplied source and destination paths.
//!
//! The engine runs in the launch directory, not necessarily the directory
//! the paths were given relative to, so everything handed onwards is
//! absolute. The source is opened once here so a missing or unreadable file
//! fails the run before a workspace is created.

use crate::error::ConvalidateError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A checked source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Absolute path of the document.
    pub path: PathBuf,
    /// Directory containing the document; engine resources resolve here.
    pub basedir: PathBuf,
    /// File name used for the copy inside the archive.
    pub file_name: String,
}

/// Resolve and check the source document.
pub fn resolve_source(source: &Path, cwd: &Path) -> Result<ResolvedSource, ConvalidateError> {
    let path = absolutize(source, cwd);

    let meta = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvalidateError::PermissionDenied { path });
        }
        Err(_) => return Err(ConvalidateError::SourceNotFound { path }),
    };
    if !meta.is_file() {
        return Err(ConvalidateError::NotAFile { path });
    }

    // Check read permission by attempting to open
    if let Err(e) = std::fs::File::open(&path) {
        return Err(if e.kind() == std::io::ErrorKind::PermissionDenied {
            ConvalidateError::PermissionDenied { path }
        } else {
            ConvalidateError::SourceNotFound { path }
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ConvalidateError::NotAFile { path: path.clone() })?;
    let basedir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());

    debug!("Resolved source: {}", path.display());
    Ok(ResolvedSource {
        path,
        basedir,
        file_name,
    })
}

/// Resolve the archive destination and the stem shared by all outputs.
///
/// Returns `(absolute destination, output stem)`; `out/paper.dhc` yields
/// the stem `paper`, so the TEI output becomes `paper.xml`.
pub fn resolve_destination(
    destination: &Path,
    cwd: &Path,
) -> Result<(PathBuf, String), ConvalidateError> {
    let path = absolutize(destination, cwd);
    if path.is_dir() {
        return Err(ConvalidateError::InvalidConfig(format!(
            "Destination '{}' is a directory; expected an archive file path",
            path.display()
        )));
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ConvalidateError::InvalidConfig(format!(
                "Destination '{}' has no file name",
                path.display()
            ))
        })?;
    Ok((path, stem))
}

/// Join a relative path onto `cwd`, leaving absolute paths untouched.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_source_against_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/paper.md"), "# Title\n").unwrap();

        let src = resolve_source(Path::new("docs/paper.md"), dir.path()).unwrap();
        assert_eq!(src.path, dir.path().join("docs/paper.md"));
        assert_eq!(src.basedir, dir.path().join("docs"));
        assert_eq!(src.file_name, "paper.md");
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_source(Path::new("nope.md"), dir.path()).unwrap_err();
        assert!(matches!(err, ConvalidateError::SourceNotFound { .. }));
    }

    #[test]
    fn directory_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_source(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConvalidateError::NotAFile { .. }));
    }

    #[test]
    fn destination_stem_drops_extension() {
        let (path, stem) =
            resolve_destination(Path::new("out/paper.dhc"), Path::new("/work")).unwrap();
        assert_eq!(path, PathBuf::from("/work/out/paper.dhc"));
        assert_eq!(stem, "paper");
    }

    #[test]
    fn destination_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_destination(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ConvalidateError::InvalidConfig(_)));
    }
}
