//! File target staleness
//!
//! Timestamp comparison between a file task's output and its inputs.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Why a target does or does not need rebuilding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The target does not exist
    Missing,
    /// A prerequisite does not exist (its producer is expected to run)
    PrerequisiteMissing(PathBuf),
    /// A prerequisite is strictly newer than the target
    PrerequisiteNewer(PathBuf),
    UpToDate,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::UpToDate)
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::Missing => write!(f, "target does not exist"),
            Staleness::PrerequisiteMissing(p) => write!(f, "{} does not exist", p.display()),
            Staleness::PrerequisiteNewer(p) => write!(f, "{} is newer", p.display()),
            Staleness::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Modification time, `None` when the path does not exist
fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Compare a target against its prerequisites.
///
/// Equal timestamps count as up to date.
pub fn check<P: AsRef<Path>>(target: &Path, prerequisites: &[P]) -> io::Result<Staleness> {
    let Some(target_time) = modified(target)? else {
        return Ok(Staleness::Missing);
    };

    for prerequisite in prerequisites {
        let prerequisite = prerequisite.as_ref();
        match modified(prerequisite)? {
            None => return Ok(Staleness::PrerequisiteMissing(prerequisite.to_path_buf())),
            Some(time) if time > target_time => {
                return Ok(Staleness::PrerequisiteNewer(prerequisite.to_path_buf()))
            }
            Some(_) => {}
        }
    }

    Ok(Staleness::UpToDate)
}

/// True if `target` must be rebuilt
pub fn needs_rebuild<P: AsRef<Path>>(target: &Path, prerequisites: &[P]) -> io::Result<bool> {
    Ok(check(target, prerequisites)?.is_stale())
}
