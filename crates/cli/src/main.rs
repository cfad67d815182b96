use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use dylib_normalizer::commands::{
    diagnose_command, fix_command, scan_command, show_policy_command, BatchSummary, RunOptions,
};

/// Normalizes install names and dependency paths of prebuilt macOS dylibs.
///
/// This CLI is a thin wrapper around `normalizer-core` (exposed in code as
/// `normalizer_core`). Mach-O decoding and rewriting live in the library.
#[derive(Parser, Debug)]
#[command(
    name = "dylib-normalizer",
    version,
    about = "Normalize install names and dependency paths of macOS dylibs",
    long_about = None
)]
struct Cli {
    /// Log progress at info level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// A library file, a mac/macos library directory, or a tree to search.
    #[arg(default_value = ".")]
    path: String,

    /// Policy file (.yaml, .yml or .json). Defaults to the built-in policy.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Worker threads (defaults to available parallelism).
    #[arg(long)]
    jobs: Option<usize>,
}

impl RunArgs {
    fn options(&self, verbose: bool) -> RunOptions {
        RunOptions { policy: self.policy.clone(), json: self.json, verbose, jobs: self.jobs }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report identity and dependency problems without modifying files.
    Scan(RunArgs),

    /// Rewrite defective paths in place.
    ///
    /// Only paths whose canonical replacement fits in the existing load
    /// command are rewritten; everything else is reported as unresolved.
    Fix(RunArgs),

    /// Show each library's container format and size.
    Diagnose(RunArgs),

    /// Print the effective normalization policy.
    Policy {
        /// Policy file to load and validate.
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Print JSON instead of YAML.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    // A second init only happens when embedded; ignore it.
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}

fn finish(summary: BatchSummary, what: &str) -> Result<()> {
    if summary.issues > 0 {
        bail!("{} of {} libraries {}", summary.issues, summary.total, what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan(args) => {
            finish(scan_command(&args.path, &args.options(cli.verbose))?, "have problems")?
        }
        Command::Fix(args) => finish(
            fix_command(&args.path, &args.options(cli.verbose))?,
            "still have problems",
        )?,
        Command::Diagnose(args) => {
            diagnose_command(&args.path, &args.options(cli.verbose))?;
        }
        Command::Policy { policy, json } => show_policy_command(policy.as_deref(), json)?,
    }

    Ok(())
}
