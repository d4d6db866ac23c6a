//! Archive assembly: zip the whole workspace into the destination file.
//!
//! The archive is written to a temporary file next to the destination and
//! renamed into place once complete, so the destination path either holds
//! the previous file or the finished archive, never a partial one.
//!
//! Entries are sorted and carry a fixed timestamp and fixed permissions, so
//! two runs over identical workspaces produce identical archives.

use crate::error::ConvalidateError;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One workspace entry, named relative to the workspace root with `/`
/// separators. Directory names end in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Compress `workspace` into `destination`.
///
/// Returns the entry names in the order they were written.
pub fn build_archive(workspace: &Path, destination: &Path) -> Result<Vec<String>, ConvalidateError> {
    let mut entries = Vec::new();
    collect_entries(workspace, workspace, &mut entries).map_err(|e| {
        ConvalidateError::Packaging {
            path: workspace.to_path_buf(),
            detail: format!("cannot read workspace: {}", e),
        }
    })?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| ConvalidateError::ArchiveWriteFailed {
        path: destination.to_path_buf(),
        source: e,
    })?;

    // Temp file in the destination directory so the final rename stays on one filesystem
    let mut tmp = tempfile::Builder::new()
        .prefix(".convalidate-")
        .suffix(".zip.tmp")
        .tempfile_in(&parent)
        .map_err(|e| ConvalidateError::ArchiveWriteFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

    write_zip(tmp.as_file_mut(), &entries).map_err(|detail| ConvalidateError::Packaging {
        path: destination.to_path_buf(),
        detail,
    })?;
    tmp.as_file().sync_all().map_err(|e| ConvalidateError::ArchiveWriteFailed {
        path: destination.to_path_buf(),
        source: e,
    })?;

    tmp.persist(destination)
        .map_err(|e| ConvalidateError::ArchiveWriteFailed {
            path: destination.to_path_buf(),
            source: e.error,
        })?;

    info!(
        "Archive written: {} ({} entries)",
        destination.display(),
        entries.len()
    );
    Ok(entries.into_iter().map(|e| e.name).collect())
}

fn write_zip(file: &mut File, entries: &[Entry]) -> Result<(), String> {
    let mut zip = ZipWriter::new(file);
    let file_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    let dir_options = file_options.unix_permissions(0o755);

    for entry in entries {
        debug!("Adding {}", entry.name);
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), dir_options)
                .map_err(|e| format!("{}: {}", entry.name, e))?;
        } else {
            zip.start_file(entry.name.as_str(), file_options)
                .map_err(|e| format!("{}: {}", entry.name, e))?;
            let bytes = std::fs::read(&entry.path).map_err(|e| format!("{}: {}", entry.name, e))?;
            zip.write_all(&bytes)
                .map_err(|e| format!("{}: {}", entry.name, e))?;
        }
    }
    zip.finish().map_err(|e| e.to_string())?;
    Ok(())
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<Entry>) -> io::Result<()> {
    for item in std::fs::read_dir(dir)? {
        let item = item?;
        let path = item.path();
        let rel = path
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if item.file_type()?.is_dir() {
            out.push(Entry {
                name: format!("{}/", name),
                path: path.clone(),
                is_dir: true,
            });
            collect_entries(root, &path, out)?;
        } else {
            out.push(Entry {
                name,
                path,
                is_dir: false,
            });
        }
    }
    Ok(())
}
