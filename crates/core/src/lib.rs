//! normalizer-core
//!
//! Core library for scanning Mach-O dylibs (thin or fat) and rewriting their
//! install names and dependency paths to a portable `@rpath` form.
//!
//! The pieces, leaves first:
//! - [`format`]: classify a file by its magic bytes.
//! - [`decode`]: bounds-checked fat and slice decoders.
//! - [`policy`]: canonical-name rules and allow-lists.
//! - [`classify`]: turn decoded slices into typed problems.
//! - [`rewrite`]: in-place, slot-bounded path edits and atomic write-back.
//! - [`services`]: the stateless `scan`/`fix` entry points.
//!
//! All substantive logic lives here so it can be tested without a CLI.

pub mod classify;
pub mod decode;
pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod format;
pub mod model;
pub mod policy;
pub mod report;
pub mod rewrite;
pub mod services;

pub use error::{DecodeError, NormalizeError, NormalizeResult, RewriteError};
pub use format::{detect_format, Format};
pub use policy::CanonicalNamePolicy;
pub use report::{Problem, ProblemKind, Report, Verdict};
pub use rewrite::{Unresolved, UnresolvedReason};
pub use services::{fix, scan, FixResult};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
