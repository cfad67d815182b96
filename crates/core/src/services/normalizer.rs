//! `scan` and `fix`: the per-file entry points.
//!
//! Each call reads one file from disk, keeps no state between calls, and is
//! safe to run concurrently for different files. Running `fix` and `scan` on
//! the same file at the same time is not supported.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::classify::classify_image;
use crate::decode::decode_image;
use crate::error::{NormalizeError, NormalizeResult};
use crate::format::{detect_format, Format};
use crate::model::Image;
use crate::policy::CanonicalNamePolicy;
use crate::report::{Problem, ProblemKind, Report, Verdict};
use crate::rewrite::{write_image_atomically, Patch, Unresolved, UnresolvedReason};

/// Outcome of `fix` for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixResult {
    pub report_before: Report,
    pub report_after: Report,
    pub bytes_written: bool,
    /// Defects whose paths were rewritten.
    pub applied: Vec<Problem>,
    /// Defects left in place, with the reason.
    pub unresolved: Vec<Unresolved>,
}

impl FixResult {
    fn unchanged(report: Report, unresolved: Vec<Unresolved>) -> Self {
        Self {
            report_after: report.clone(),
            report_before: report,
            bytes_written: false,
            applied: Vec::new(),
            unresolved,
        }
    }

    /// True when every defect still reported after the fix is one `fix`
    /// deliberately left unresolved.
    pub fn converged(&self) -> bool {
        self.report_after
            .defects()
            .all(|after| self.unresolved.iter().any(|u| u.problem.same_defect(after)))
    }
}

struct Analysis {
    report: Report,
    decoded: Option<(Vec<u8>, Image)>,
}

/// Scan one file and report its verdict and problems.
///
/// Only I/O failures are returned as errors; structural problems produce an
/// `Unparseable` verdict.
pub fn scan(path: &Path, policy: &CanonicalNamePolicy) -> NormalizeResult<Report> {
    Ok(analyze(path, policy)?.report)
}

/// Scan one file and rewrite every fixable path defect in place.
///
/// Files that are not `HasProblems` are never written. When no defect can be
/// fixed the file is left byte-for-byte untouched.
pub fn fix(path: &Path, policy: &CanonicalNamePolicy) -> NormalizeResult<FixResult> {
    let Analysis { report, decoded } = analyze(path, policy)?;
    let (mut bytes, image) = match decoded {
        Some(decoded) if report.verdict == Verdict::HasProblems => decoded,
        _ => return Ok(FixResult::unchanged(report, Vec::new())),
    };

    let mut applied = Vec::new();
    let mut unresolved = Vec::new();
    for problem in report.defects() {
        match plan_and_apply(&image, &mut bytes, problem) {
            Ok(()) => applied.push(problem.clone()),
            Err(reason) => {
                if let UnresolvedReason::SlotTooSmall { needed, available } = reason {
                    warn!(
                        "{}: replacement for {:?} needs {needed} bytes, slot holds {available}",
                        path.display(),
                        problem.current.as_deref().unwrap_or_default()
                    );
                }
                unresolved.push(Unresolved { problem: problem.clone(), reason });
            }
        }
    }

    if applied.is_empty() {
        return Ok(FixResult::unchanged(report, unresolved));
    }

    write_image_atomically(path, &bytes)?;
    info!("{}: rewrote {} path(s)", path.display(), applied.len());

    let report_after = scan(path, policy)?;
    let result =
        FixResult { report_before: report, report_after, bytes_written: true, applied, unresolved };
    if !result.converged() {
        warn!("{}: problems remain after fix that were not expected", path.display());
    }
    Ok(result)
}

fn plan_and_apply(
    image: &Image,
    bytes: &mut [u8],
    problem: &Problem,
) -> Result<(), UnresolvedReason> {
    let (Some(location), Some(current), Some(replacement)) =
        (problem.location, problem.current.as_deref(), problem.replacement.as_deref())
    else {
        return Err(UnresolvedReason::NoReplacement);
    };
    let patch = Patch::plan(image, location, current, replacement)?;
    patch.apply(bytes)?;
    debug!(
        "patched slice {} command {}: {current} -> {replacement}",
        location.slice, location.command
    );
    Ok(())
}

fn analyze(path: &Path, policy: &CanonicalNamePolicy) -> NormalizeResult<Analysis> {
    let metadata = fs::metadata(path).map_err(|e| NormalizeError::io(path, e))?;
    let size = metadata.len();
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let format = detect_format(path)?;

    let mut report = Report {
        path: path.to_path_buf(),
        canonical_name: policy.canonical_name(&file_name),
        size,
        format,
        verdict: Verdict::Clean,
        slices: Vec::new(),
        problems: Vec::new(),
    };

    if size < policy.stub_threshold {
        report.verdict = Verdict::Stub;
        report.problems.push(Problem::file_level(
            ProblemKind::Stub,
            format!("Stub library ({size} bytes) - skipping checks"),
        ));
        return Ok(Analysis { report, decoded: None });
    }

    if format.is_foreign() {
        report.verdict = Verdict::Foreign;
        report.problems.push(Problem::file_level(
            ProblemKind::ForeignFormat,
            format!("{} - decompress first", format.description()),
        ));
        return Ok(Analysis { report, decoded: None });
    }

    match format {
        Format::Placeholder => {
            report.verdict = Verdict::Stub;
            report
                .problems
                .push(Problem::file_level(ProblemKind::Stub, format.description()));
            return Ok(Analysis { report, decoded: None });
        }
        Format::Unknown => {
            report.verdict = Verdict::Unparseable;
            report
                .problems
                .push(Problem::file_level(ProblemKind::Unparseable, format.description()));
            return Ok(Analysis { report, decoded: None });
        }
        _ => {}
    }

    let bytes = fs::read(path).map_err(|e| NormalizeError::io(path, e))?;
    let image = match decode_image(&bytes) {
        Ok(image) => image,
        Err(err) => {
            warn!("{}: {err}", path.display());
            report.verdict = Verdict::Unparseable;
            report.problems.push(Problem::file_level(ProblemKind::Unparseable, err.to_string()));
            return Ok(Analysis { report, decoded: None });
        }
    };

    report.slices = image.slices.iter().map(|s| s.summary()).collect();
    report.problems = classify_image(&image, &report.canonical_name, policy);
    report.verdict =
        if report.problems.is_empty() { Verdict::Clean } else { Verdict::HasProblems };
    debug!(
        "{}: {} slice(s), verdict {}",
        path.display(),
        image.slices.len(),
        report.verdict.as_str()
    );

    Ok(Analysis { report, decoded: Some((bytes, image)) })
}
