use std::fs;

use anyhow::{Context, Result};
use normalizer_core::{detect_format, scan, CanonicalNamePolicy, Format};
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::discover::{discover_candidates, Candidate};
use crate::commands::outcome::print_slices;
use crate::commands::policy::load_policy;
use crate::commands::RunOptions;

#[derive(Debug, Serialize)]
pub struct DiagnoseEntry {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Read failure for this file; the rest of the batch still runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn diagnose_one(candidate: Candidate) -> DiagnoseEntry {
    let inspect = || -> Result<(Format, u64)> {
        let size = fs::metadata(&candidate.path)
            .with_context(|| format!("Failed to stat {}", candidate.path.display()))?
            .len();
        let format = detect_format(&candidate.path)
            .with_context(|| format!("Failed to read {}", candidate.path.display()))?;
        Ok((format, size))
    };
    match inspect() {
        Ok((format, size)) => DiagnoseEntry {
            format: Some(format),
            description: Some(format.description()),
            size: Some(size),
            error: None,
            candidate,
        },
        Err(err) => DiagnoseEntry {
            format: None,
            description: None,
            size: None,
            error: Some(format!("{err:#}")),
            candidate,
        },
    }
}

/// Diagnose each candidate in order; a failure is recorded on its entry.
pub fn diagnose_candidates(candidates: Vec<Candidate>) -> Vec<DiagnoseEntry> {
    candidates.into_iter().map(diagnose_one).collect()
}

fn print_entry(entry: &DiagnoseEntry, policy: &CanonicalNamePolicy, verbose: bool) {
    println!("{}:", entry.candidate.path.display());
    if let Some(err) = &entry.error {
        println!("  ERROR: {}", err);
        return;
    }
    if let (Some(format), Some(description)) = (entry.format, entry.description) {
        println!("  Format: {} ({})", format.as_str(), description);
    }
    if let Some(size) = entry.size {
        println!("  Size: {} bytes", size);
    }
    if verbose && entry.format.is_some_and(Format::is_image) {
        match scan(&entry.candidate.path, policy) {
            Ok(report) => {
                println!("  Slices:");
                print_slices(&report.slices, "    ");
            }
            Err(err) => println!("  ERROR: {}", err),
        }
    }
}

/// Report each library's detected container format and size. Files that
/// cannot be read are reported individually.
pub fn diagnose_command(path: &str, opts: &RunOptions) -> Result<Vec<DiagnoseEntry>> {
    let root = canonicalize_or_current(path)?;
    let policy = load_policy(opts.policy.as_deref())?;
    let candidates = discover_candidates(&root, &policy)?;

    let entries = diagnose_candidates(candidates);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(entries);
    }

    if entries.is_empty() {
        println!("No macOS libraries found under {}", root.display());
    }
    for entry in &entries {
        print_entry(entry, &policy, opts.verbose);
    }
    Ok(entries)
}
