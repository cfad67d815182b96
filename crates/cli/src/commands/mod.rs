use std::path::PathBuf;

pub mod diagnose;
pub mod discover;
pub mod fix;
pub mod outcome;
pub mod policy;
pub mod pool;
pub mod scan;
pub mod util;

pub use diagnose::diagnose_command;
pub use discover::discover_candidates;
pub use fix::fix_command;
pub use outcome::BatchSummary;
pub use policy::{load_policy, show_policy_command};
pub use scan::scan_command;

/// Options shared by `scan`, `fix` and `diagnose`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub policy: Option<PathBuf>,
    pub json: bool,
    pub verbose: bool,
    pub jobs: Option<usize>,
}
