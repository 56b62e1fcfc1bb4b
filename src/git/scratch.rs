use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Temp directory removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    /// Reserve a unique path under the system temp dir. The directory itself
    /// is created by whatever populates it (e.g. `git clone`).
    pub fn new(prefix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
        Self { path, keep: false }
    }

    /// Leave the directory on disk after drop, for debugging
    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Path of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            log::info!("Keeping scratch directory {}", self.path.display());
            return;
        }
        if self.path.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.path)
        {
            log::warn!("Failed to remove {}: {e}", self.path.display());
        }
    }
}
