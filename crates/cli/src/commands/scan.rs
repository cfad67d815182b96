use anyhow::Result;
use normalizer_core::scan;

use crate::canonicalize_or_current;
use crate::commands::discover::{discover_candidates, Candidate};
use crate::commands::outcome::{print_outcomes, BatchDocument, BatchSummary, FileOutcome};
use crate::commands::policy::load_policy;
use crate::commands::pool::run_pool;
use crate::commands::RunOptions;

/// Scan every library under `path` and report problems without modifying anything.
pub fn scan_command(path: &str, opts: &RunOptions) -> Result<BatchSummary> {
    let root = canonicalize_or_current(path)?;
    let policy = load_policy(opts.policy.as_deref())?;
    let candidates = discover_candidates(&root, &policy)?;

    let outcomes = run_pool(&candidates, opts.jobs, |c: &Candidate| match scan(&c.path, &policy) {
        Ok(report) => FileOutcome::from_report(c.clone(), report, None),
        Err(err) => FileOutcome::failed(c.clone(), err),
    })?;

    if opts.json {
        let doc = BatchDocument::new("scan", &root, &outcomes);
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else if candidates.is_empty() {
        println!("No macOS libraries found under {}", root.display());
    } else {
        print_outcomes(&outcomes, opts.verbose, false);
    }

    Ok(BatchSummary::from_outcomes(&outcomes))
}
