//! Bounded, in-place path rewriting and atomic write-back.
//!
//! A replacement never grows a load command: it must fit, terminator
//! included, in the bytes between the string offset and the end of the
//! command it already lives in.

use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{NormalizeError, NormalizeResult, RewriteError};
use crate::model::{CommandRef, Image};
use crate::report::Problem;

/// A single path edit located in absolute image coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub location: CommandRef,
    /// Whole string slot: from the string offset to the end of the command.
    pub slot: Range<usize>,
    /// Length of the string currently stored, without terminator.
    pub old_len: usize,
    pub replacement: String,
}

impl Patch {
    /// Locate the command a problem refers to and check the replacement fits.
    pub fn plan(
        image: &Image,
        location: CommandRef,
        expected_current: &str,
        replacement: &str,
    ) -> Result<Patch, RewriteError> {
        let stale = RewriteError::StaleCommand { slice: location.slice, command: location.command };
        let slice = image.slices.get(location.slice).ok_or(stale.clone())?;
        let command = slice.commands.get(location.command).ok_or(stale.clone())?;
        let path = command.path.as_ref().filter(|p| p.value == expected_current).ok_or(stale)?;
        let slot = slice.path_slot(command).ok_or(RewriteError::StaleCommand {
            slice: location.slice,
            command: location.command,
        })?;

        let needed = replacement.len() + 1;
        let available = slot.len();
        if needed > available {
            return Err(RewriteError::SlotTooSmall { needed, available });
        }

        Ok(Patch {
            location,
            slot,
            old_len: path.stored_len,
            replacement: replacement.to_string(),
        })
    }

    /// Write the replacement and its terminator, then zero what is left of
    /// the old string so no stale bytes stay readable.
    pub fn apply(&self, bytes: &mut [u8]) -> Result<(), RewriteError> {
        let needed = self.replacement.len() + 1;
        if needed > self.slot.len() || self.slot.end > bytes.len() {
            return Err(RewriteError::SlotTooSmall { needed, available: self.slot.len() });
        }

        let start = self.slot.start;
        let written_end = start + self.replacement.len();
        bytes[start..written_end].copy_from_slice(self.replacement.as_bytes());
        let clear_end = (start + self.old_len.max(needed)).min(self.slot.end);
        bytes[written_end..clear_end].fill(0);
        Ok(())
    }
}

/// Why a path defect was left in place by `fix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The canonical replacement does not fit in the existing slot.
    SlotTooSmall { needed: usize, available: usize },
    /// The policy has no canonical replacement for this path.
    NoReplacement,
    /// The command no longer matched what the scan recorded.
    Stale,
}

impl From<RewriteError> for UnresolvedReason {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::SlotTooSmall { needed, available } => {
                UnresolvedReason::SlotTooSmall { needed, available }
            }
            RewriteError::StaleCommand { .. } => UnresolvedReason::Stale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unresolved {
    pub problem: Problem,
    #[serde(flatten)]
    pub reason: UnresolvedReason,
}

/// Replace the file at `path` (or the file it links to) with `bytes` via a
/// temp file in the same directory, keeping the original permissions. The original stays intact
/// if anything fails before the final rename.
pub fn write_image_atomically(path: &Path, bytes: &[u8]) -> NormalizeResult<()> {
    // Symlinks are written through: the temp file replaces the link target.
    let target = fs::canonicalize(path).map_err(|e| NormalizeError::io(path, e))?;
    let path = target.as_path();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).map_err(|e| NormalizeError::io(path, e))?.permissions();

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| NormalizeError::io(dir, e))?;
    debug!("writing {} bytes to temporary file {}", bytes.len(), temp.path().display());
    temp.write_all(bytes).map_err(|e| NormalizeError::io(temp.path(), e))?;
    temp.flush().map_err(|e| NormalizeError::io(temp.path(), e))?;
    temp.as_file().sync_all().map_err(|e| NormalizeError::io(temp.path(), e))?;
    fs::set_permissions(temp.path(), permissions)
        .map_err(|e| NormalizeError::io(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| NormalizeError::Persist { path: path.to_path_buf(), source: e.error })?;
    Ok(())
}
