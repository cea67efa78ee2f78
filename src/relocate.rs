//! Directory relocation.
//!
//! Moves whole directories between `~/.config` and profile storage with a plain
//! rename. A batch keeps going after a failed move and reports every directory
//! on its own.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DotmanError, Result};

/// One requested move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// Tracked directory name
    pub name: String,
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl PlannedMove {
    pub fn new(name: impl Into<String>, source: PathBuf, dest: PathBuf) -> Self {
        Self {
            name: name.into(),
            source,
            dest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum MoveStatus {
    Moved,
    /// Source absent or not a directory
    Missing,
    Failed(String),
}

/// What happened to a single directory in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationOutcome {
    pub name: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    #[serde(flatten)]
    pub status: MoveStatus,
}

impl RelocationOutcome {
    /// A move refused before touching the filesystem
    pub fn rejected(planned: PlannedMove, reason: impl Into<String>) -> Self {
        Self {
            name: planned.name,
            source: planned.source,
            dest: planned.dest,
            status: MoveStatus::Failed(reason.into()),
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.status, MoveStatus::Moved)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, MoveStatus::Failed(_))
    }
}

/// Rename `source` (a directory) to `dest`.
///
/// An existing `dest` is an error; nothing is merged or overwritten.
pub fn move_directory(source: &Path, dest: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(DotmanError::DirectoryNotFound(source.to_path_buf()));
    }

    // symlink_metadata so a dangling link at dest still counts as occupied
    if fs::symlink_metadata(dest).is_ok() {
        return Err(DotmanError::RelocationFailed {
            path: source.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination already exists: {}", dest.display()),
            ),
        });
    }

    fs::rename(source, dest).map_err(|e| DotmanError::RelocationFailed {
        path: source.to_path_buf(),
        source: e,
    })?;

    debug!(from = %source.display(), to = %dest.display(), "moved directory");
    Ok(())
}

/// Move every planned directory, in order, and report each one.
pub fn move_many<I>(moves: I) -> Vec<RelocationOutcome>
where
    I: IntoIterator<Item = PlannedMove>,
{
    moves.into_iter().map(relocate).collect()
}

fn relocate(planned: PlannedMove) -> RelocationOutcome {
    let status = match move_directory(&planned.source, &planned.dest) {
        Ok(()) => MoveStatus::Moved,
        Err(DotmanError::DirectoryNotFound(_)) => {
            debug!(source = %planned.source.display(), "nothing to move");
            MoveStatus::Missing
        }
        Err(e) => {
            warn!(name = %planned.name, error = %e, "move failed");
            MoveStatus::Failed(e.to_string())
        }
    };

    RelocationOutcome {
        name: planned.name,
        source: planned.source,
        dest: planned.dest,
        status,
    }
}

/// Names of the subdirectories of `dir`, sorted. Files and non-UTF-8 names are skipped.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DotmanError::io(dir, e))? {
        let entry = entry.map_err(|e| DotmanError::io(dir, e))?;
        if entry.path().is_dir()
            && let Some(name) = entry.file_name().to_str()
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
