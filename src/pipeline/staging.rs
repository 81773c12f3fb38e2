//! The run's private working directory and per-file scratch guards.
//!
//! [`StagingArea`] is created once per run and threaded through every stage
//! by reference; no stage changes the process working directory. Dropping
//! the handle deletes the tree, so every `?` that aborts the run also tears
//! the staging area down before the error reaches the caller.

use crate::error::BookOcrError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusively owned working directory of one run.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    closed: bool,
}

impl StagingArea {
    /// Create the directory at `path`. Fails if it already exists, so two
    /// runs never share a staging area.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BookOcrError> {
        let path = path.into();
        std::fs::create_dir(&path).map_err(|source| BookOcrError::StagingCreate {
            path: path.clone(),
            source,
        })?;
        debug!("Opened staging area {}", path.display());
        Ok(Self {
            path,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the staging area.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Delete the staging area now, reporting any failure.
    pub fn close(mut self) -> Result<(), BookOcrError> {
        self.closed = true;
        std::fs::remove_dir_all(&self.path).map_err(|e| BookOcrError::io(&self.path, e))?;
        debug!("Removed staging area {}", self.path.display());
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed staging area {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Could not remove staging area {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// An intermediate file deleted when the guard goes out of scope.
///
/// Created before the tool that writes the file runs, so a failing tool's
/// partial output is removed too.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// Remove `path`, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<(), BookOcrError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BookOcrError::io(path, e)),
    }
}
