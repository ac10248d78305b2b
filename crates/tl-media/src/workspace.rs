//! File lifecycle guards for uploads.
//!
//! A [`StagedUpload`] owns the file the upload layer wrote to the staging
//! area and removes it exactly once: explicitly through
//! [`StagedUpload::remove`], or on drop if nobody did. A [`WorkingCopy`] is
//! the isolated per-job copy the video pipeline reads from; it is removed
//! when the job reaches a terminal state.
//!
//! Removal here is always best-effort. Failures are logged and never
//! returned, so cleanup cannot change the outcome of a job.

use std::path::{Path, PathBuf};

/// Remove `path`, logging instead of failing. Returns `true` when a file was
/// actually deleted.
pub fn remove_best_effort(path: &Path, what: &str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!("Removed {what} {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("{what} {} already gone", path.display());
            false
        }
        Err(e) => {
            tracing::warn!("Failed to remove {what} {}: {e}", path.display());
            false
        }
    }
}

// ---------------------------------------------------------------------------
// StagedUpload
// ---------------------------------------------------------------------------

/// The original upload as written by the receiving layer.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    armed: bool,
}

impl StagedUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file now.
    pub fn remove(mut self) {
        self.armed = false;
        remove_best_effort(&self.path, "staged upload");
    }

    /// Give up ownership without touching the file, for when a transcoder
    /// already consumed it.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.armed {
            remove_best_effort(&self.path, "staged upload");
        }
    }
}

// ---------------------------------------------------------------------------
// WorkingCopy
// ---------------------------------------------------------------------------

/// A per-job copy of the staged upload inside the temp directory.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
    armed: bool,
}

impl WorkingCopy {
    /// Copy `source` to `temp_dir/<name>`.
    ///
    /// A partially written copy is removed before the error is returned.
    pub async fn stage(source: &Path, temp_dir: &Path, name: &str) -> tl_core::Result<Self> {
        let dest = temp_dir.join(name);
        if let Err(e) = tokio::fs::copy(source, &dest).await {
            remove_best_effort(&dest, "partial working copy");
            return Err(e.into());
        }
        Ok(Self {
            path: dest,
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the working copy.
    pub fn cleanup(mut self) {
        self.armed = false;
        remove_best_effort(&self.path, "working copy");
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        if self.armed {
            remove_best_effort(&self.path, "working copy");
        }
    }
}
