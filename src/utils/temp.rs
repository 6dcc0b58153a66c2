//! Staging directory with guaranteed cleanup.
//!
//! The installer is downloaded into a freshly created, uniquely named
//! directory. [`StagingDir::close`] removes it explicitly so the result can be
//! logged; `Drop` removes it on any path that skipped `close` (early return,
//! panic).

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A temporary directory that is removed when closed or dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use certbot_updater::utils::temp::StagingDir;
///
/// # fn example() -> std::io::Result<()> {
/// let staging = StagingDir::new("upgrade")?;
/// std::fs::write(staging.path().join("installer.exe"), b"MZ")?;
/// let path = staging.path().to_path_buf();
/// staging.close()?;
/// assert!(!path.exists());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    released: bool,
}

impl StagingDir {
    /// Create `certbot-updater_{prefix}_{uuid}` in the system temporary directory.
    pub fn new(prefix: &str) -> std::io::Result<Self> {
        Self::new_in(&std::env::temp_dir(), prefix)
    }

    /// Create the staging directory under `parent`.
    pub fn new_in(parent: &Path, prefix: &str) -> std::io::Result<Self> {
        let unique_name = format!("certbot-updater_{}_{}", prefix, uuid::Uuid::new_v4());
        let path = parent.join(unique_name);

        std::fs::create_dir_all(&path)?;
        debug!("Created staging directory {}", path.display());

        Ok(Self {
            path,
            released: false,
        })
    }

    /// Path of the staging directory.
    ///
    /// The directory exists until [`StagingDir::close`] is called or the value is dropped.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    ///
    /// A directory that is already gone counts as removed.
    pub fn close(mut self) -> std::io::Result<()> {
        self.released = true;
        remove(&self.path)
    }
}

fn remove(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed staging directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = remove(&self.path)
        {
            warn!("Failed to remove staging directory {}: {}", self.path.display(), e);
        }
    }
}
