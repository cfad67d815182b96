use std::path::Path;

use anyhow::Result;
use normalizer_core::{fix, CanonicalNamePolicy, FixResult};

use crate::{canonicalize_or_current, sha256_file};
use crate::commands::discover::{discover_candidates, Candidate};
use crate::commands::outcome::{print_outcomes, BatchDocument, BatchSummary, FileOutcome, FixDetails};
use crate::commands::policy::load_policy;
use crate::commands::pool::run_pool;
use crate::commands::RunOptions;

/// SHA-256 of `path`, or `None` with the failure appended to `errors`.
fn digest_or_record(path: &Path, errors: &mut Vec<String>) -> Option<String> {
    match sha256_file(path) {
        Ok(hex) => Some(hex),
        Err(err) => {
            errors.push(format!("{err:#}"));
            None
        }
    }
}

fn fix_one(candidate: &Candidate, policy: &CanonicalNamePolicy, hash: bool) -> FileOutcome {
    let mut hash_errors = Vec::new();
    let mut digest =
        |c: &Candidate| if hash { digest_or_record(&c.path, &mut hash_errors) } else { None };
    let sha256_before = digest(candidate);

    let result = match fix(&candidate.path, policy) {
        Ok(result) => result,
        Err(err) => return FileOutcome::failed(candidate.clone(), err),
    };
    let converged = result.converged();
    let FixResult { report_before, report_after, bytes_written, applied, unresolved } = result;
    let sha256_after = if bytes_written { digest(candidate) } else { sha256_before.clone() };

    let details = FixDetails {
        bytes_written,
        converged,
        problems_before: report_before.defects().count(),
        applied,
        unresolved,
        sha256_before,
        sha256_after,
    };
    let mut outcome = FileOutcome::from_report(candidate.clone(), report_after, Some(details));
    if !hash_errors.is_empty() {
        outcome.error = Some(hash_errors.join("; "));
    }
    outcome
}

/// Rewrite defective install names and dependency paths under `path`.
pub fn fix_command(path: &str, opts: &RunOptions) -> Result<BatchSummary> {
    let root = canonicalize_or_current(path)?;
    let policy = load_policy(opts.policy.as_deref())?;
    let candidates = discover_candidates(&root, &policy)?;

    let outcomes = run_pool(&candidates, opts.jobs, |c: &Candidate| fix_one(c, &policy, opts.json))?;

    if opts.json {
        let doc = BatchDocument::new("fix", &root, &outcomes);
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else if candidates.is_empty() {
        println!("No macOS libraries found under {}", root.display());
    } else {
        print_outcomes(&outcomes, opts.verbose, true);
    }

    Ok(BatchSummary::from_outcomes(&outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut errors = Vec::new();

        assert_eq!(digest_or_record(&dir.path().join("gone.bin"), &mut errors), None);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Failed to open library for hashing"), "{}", errors[0]);
    }

    #[test]
    fn missing_file_outcome_carries_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mac/libgone.bin");
        let candidate = Candidate {
            component: "drv".into(),
            arch: "mac".into(),
            dir: dir.path().join("mac"),
            file_name: "libgone.bin".into(),
            path,
        };

        let outcome = fix_one(&candidate, &CanonicalNamePolicy::default(), true);
        assert!(outcome.error.is_some());
        assert!(outcome.report.is_none());
    }
}
