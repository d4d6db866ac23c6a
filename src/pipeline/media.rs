//! Asset relocation for engine-extracted media.
//!
//! Pandoc writes extracted images into a directory named by
//! `--extract-media`, relative to the directory it runs in. Output files
//! then reference `Pictures/<hash>.png`, so the directory must end up next
//! to the outputs in the workspace under the same name, and must not stay
//! behind in the launch directory.
//!
//! [`MediaDirLease`] wraps that side effect:
//!
//! 1. [`MediaDirLease::acquire`] probes `Pictures`, `Pictures1`, `Pictures2`, …
//!    for a name that does not exist in the launch directory yet.
//! 2. The engine runs with `--extract-media=<name>`.
//! 3. [`MediaDirLease::relocate`] copies the tree into the workspace (unless
//!    an earlier format already put one there) and deletes the transient copy.
//! 4. Dropping the lease deletes the transient copy if it is still there, so
//!    a failed or timed-out conversion cleans up too.
//!
//! Probing is not atomic: two runs sharing a launch directory can race for
//! the same name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A claimed, not-yet-existing media directory name in the launch directory.
#[derive(Debug)]
pub struct MediaDirLease {
    launch_dir: PathBuf,
    name: String,
}

impl MediaDirLease {
    /// Claim the first free name of the form `base`, `base1`, `base2`, …
    pub fn acquire(launch_dir: &Path, base: &str) -> Self {
        let mut name = base.to_string();
        let mut counter = 1u32;
        while launch_dir.join(&name).exists() {
            name = format!("{}{}", base, counter);
            counter += 1;
        }
        debug!("Media directory for this conversion: {}", name);
        Self {
            launch_dir: launch_dir.to_path_buf(),
            name,
        }
    }

    /// Directory name passed to the engine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the engine leaves extracted media.
    pub fn transient_path(&self) -> PathBuf {
        self.launch_dir.join(&self.name)
    }

    /// Move extracted media into `workspace`.
    ///
    /// Returns the directory name inside the workspace when the engine
    /// extracted anything, `None` otherwise. An existing directory of the
    /// same name in the workspace is kept as is. The tree is staged next to
    /// its destination and renamed into place only once fully copied, so a
    /// failed copy leaves nothing behind under that name.
    pub fn relocate(&self, workspace: &Path) -> io::Result<Option<String>> {
        let transient = self.transient_path();
        if !transient.is_dir() {
            return Ok(None);
        }
        let dest = workspace.join(&self.name);
        let copied = if dest.exists() {
            debug!("{} already relocated by an earlier format", self.name);
            Ok(())
        } else {
            stage_and_rename(&transient, workspace, &dest)
        };
        // The transient copy goes even if the copy failed.
        let removed = fs::remove_dir_all(&transient);
        copied?;
        removed?;
        debug!("Relocated {} into {}", transient.display(), dest.display());
        Ok(Some(self.name.clone()))
    }
}

/// Copy `src` into a staging directory under `parent`, then rename it to
/// `dest`. The staging directory is removed on drop if the copy fails.
fn stage_and_rename(src: &Path, parent: &Path, dest: &Path) -> io::Result<()> {
    let staging = tempfile::Builder::new()
        .prefix(".media-")
        .tempdir_in(parent)?;
    copy_dir_contents(src, staging.path())?;
    fs::rename(staging.path(), dest)?;
    // Renamed away; dropping the handle finds nothing left to remove.
    drop(staging);
    Ok(())
}

impl Drop for MediaDirLease {
    fn drop(&mut self) {
        let transient = self.transient_path();
        if transient.exists() {
            if let Err(e) = fs::remove_dir_all(&transient) {
                warn!(
                    "Failed to remove transient media directory {}: {}",
                    transient.display(),
                    e
                );
            }
        }
    }
}

/// Recursively copy `src` to `dst`, which must not exist yet.
fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir(dst)?;
    copy_dir_contents(src, dst)
}

fn copy_dir_contents(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
