use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use normalizer_core::CanonicalNamePolicy;
use serde::Serialize;

use crate::commands::util::file_name_of;

/// Directory names that hold prebuilt macOS libraries.
pub const LIBRARY_DIR_NAMES: &[&str] =
    &["mac", "mac_x64", "mac_arm64", "macos", "macos_x64", "macos_arm64"];

/// A library file to scan or fix, with the component and architecture
/// directory it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Name of the directory above the library directory (the driver/component).
    pub component: String,
    /// Name of the library directory itself (e.g. `mac_arm64`).
    pub arch: String,
    pub dir: PathBuf,
    pub path: PathBuf,
    pub file_name: String,
}

impl Candidate {
    fn new(dir: &Path, path: PathBuf) -> Self {
        let component = dir.parent().map(file_name_of).unwrap_or_default();
        Self {
            component,
            arch: file_name_of(dir),
            dir: dir.to_path_buf(),
            file_name: file_name_of(&path),
            path,
        }
    }
}

pub fn is_library_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| LIBRARY_DIR_NAMES.contains(&n))
        .unwrap_or(false)
}

/// Recursively find library directories under `root`, sorted.
pub fn find_library_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            // file_type() does not follow symlinks, so link cycles are not walked.
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            if is_library_dir(&path) {
                found.push(path.clone());
            }
            pending.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Regular library files (by the policy's extensions) directly inside `dir`,
/// sorted. Symlinks are not followed.
pub fn find_library_files(dir: &Path, policy: &CanonicalNamePolicy) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        // Symlinked aliases (libfoo.dylib -> libfoo.1.dylib) are skipped; the
        // file they point at is a candidate in its own right.
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if policy.is_library_file(&file_name_of(&path)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Expand a user-supplied path into the ordered list of candidates.
///
/// A file is taken as-is; a library directory contributes its libraries; any
/// other directory is searched recursively for library directories.
pub fn discover_candidates(path: &Path, policy: &CanonicalNamePolicy) -> Result<Vec<Candidate>> {
    if !path.exists() {
        return Err(anyhow!("Path does not exist: {}", path.display()));
    }
    if path.is_file() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        return Ok(vec![Candidate::new(dir, path.to_path_buf())]);
    }

    let dirs = if is_library_dir(path) { vec![path.to_path_buf()] } else { find_library_dirs(path)? };
    log::debug!("found {} library directories under {}", dirs.len(), path.display());

    let mut candidates = Vec::new();
    for dir in dirs {
        for file in find_library_files(&dir, policy)? {
            candidates.push(Candidate::new(&dir, file));
        }
    }
    Ok(candidates)
}
