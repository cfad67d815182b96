use std::path::Path;

use chrono::Utc;
use normalizer_core::model::SliceSummary;
use normalizer_core::{Problem, Report, Unresolved, UnresolvedReason, Verdict};
use serde::Serialize;

use crate::commands::discover::Candidate;

/// How one file counts towards the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Skipped,
    Issues,
}

/// Fix-specific details for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FixDetails {
    pub bytes_written: bool,
    pub converged: bool,
    pub problems_before: usize,
    pub applied: Vec<Problem>,
    pub unresolved: Vec<Unresolved>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_after: Option<String>,
}

/// Result row for one candidate file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixDetails>,
    /// Per-file failure (I/O, persist) that kept the file from being judged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn from_report(candidate: Candidate, report: Report, fix: Option<FixDetails>) -> Self {
        let status = match report.verdict {
            Verdict::Clean => Status::Ok,
            v if v.is_skipped() => Status::Skipped,
            _ => Status::Issues,
        };
        Self { candidate, status, report: Some(report), fix, error: None }
    }

    pub fn failed(candidate: Candidate, error: impl ToString) -> Self {
        Self {
            candidate,
            status: Status::Issues,
            report: None,
            fix: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub ok: usize,
    pub skipped: usize,
    pub issues: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        let mut summary = BatchSummary { total: outcomes.len(), ..Default::default() };
        for outcome in outcomes {
            match outcome.status {
                Status::Ok => summary.ok += 1,
                Status::Skipped => summary.skipped += 1,
                Status::Issues => summary.issues += 1,
            }
        }
        summary
    }
}

/// JSON document emitted by `scan --json` and `fix --json`.
#[derive(Debug, Serialize)]
pub struct BatchDocument<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    pub generated_at: String,
    pub root: String,
    pub summary: BatchSummary,
    pub files: &'a [FileOutcome],
}

impl<'a> BatchDocument<'a> {
    pub fn new(mode: &'static str, root: &Path, files: &'a [FileOutcome]) -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            mode,
            generated_at: Utc::now().to_rfc3339(),
            root: root.display().to_string(),
            summary: BatchSummary::from_outcomes(files),
            files,
        }
    }
}

fn status_mark(status: Status) -> &'static str {
    match status {
        Status::Ok => "✓",
        Status::Skipped => "⊘",
        Status::Issues => "✗",
    }
}

fn unresolved_line(unresolved: &Unresolved) -> String {
    let why = match &unresolved.reason {
        UnresolvedReason::SlotTooSmall { needed, available } => {
            format!("replacement needs {} bytes, slot holds {}", needed, available)
        }
        UnresolvedReason::NoReplacement => "no canonical replacement".to_string(),
        UnresolvedReason::Stale => "command changed since scan".to_string(),
    };
    format!("{} ({})", unresolved.problem, why)
}

pub fn print_slices(slices: &[SliceSummary], indent: &str) {
    for slice in slices {
        println!(
            "{}- {} @ {:#x} ({}-bit, {:?} endian)",
            indent, slice.arch, slice.offset, slice.bits, slice.byte_order
        );
        if let Some(id) = &slice.identity {
            println!("{}    id: {}", indent, id);
        }
        for dep in &slice.dependencies {
            println!("{}    dep: {}", indent, dep);
        }
    }
}

/// Print outcomes grouped by library directory, then the summary.
pub fn print_outcomes(outcomes: &[FileOutcome], verbose: bool, fixing: bool) {
    let mut current_dir = None;
    for outcome in outcomes {
        let c = &outcome.candidate;
        // Quiet mode only lists files that need attention.
        let rewritten = outcome.fix.as_ref().map(|f| f.bytes_written).unwrap_or(false);
        let interesting = verbose || rewritten || outcome.status == Status::Issues;
        if !interesting {
            continue;
        }
        if current_dir.as_ref() != Some(&c.dir) {
            println!();
            println!("{} ({})", c.component, c.arch);
            println!("  Directory: {}", c.dir.display());
            current_dir = Some(c.dir.clone());
        }

        let canonical = outcome.report.as_ref().map(|r| r.canonical_name.as_str()).unwrap_or("?");
        println!("  {} {} ({})", status_mark(outcome.status), c.file_name, canonical);

        if let Some(err) = &outcome.error {
            println!("    ERROR: {}", err);
        }
        if let Some(fix) = &outcome.fix {
            for applied in &fix.applied {
                println!("    Fixed {}", applied);
            }
            for unresolved in &fix.unresolved {
                println!("    Unresolved {}", unresolved_line(unresolved));
            }
        }
        if let Some(report) = &outcome.report {
            // After a fix, remaining defects were already listed as unresolved.
            if !fixing || report.verdict != Verdict::HasProblems {
                for problem in &report.problems {
                    println!("    {}", problem);
                }
            }
            if verbose {
                print_slices(&report.slices, "    ");
            }
        }
    }

    let summary = BatchSummary::from_outcomes(outcomes);
    println!();
    println!("Summary:");
    println!("  Total libraries: {}", summary.total);
    println!("  OK: {}", summary.ok);
    println!("  Skipped: {}", summary.skipped);
    if fixing {
        println!("  Issues remaining: {}", summary.issues);
    } else {
        println!("  Issues found: {}", summary.issues);
    }
}
