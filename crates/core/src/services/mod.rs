//! Stateless per-file services built on the decoders, classifier and rewriter.

pub mod normalizer;

pub use normalizer::{fix, scan, FixResult};
