//! Error types for decoding, rewriting, and per-file I/O.

use std::path::PathBuf;

use thiserror::Error;

/// Structural problems found while decoding an image.
///
/// Every variant corresponds to a bounds check; the decoders never read past
/// the end of the image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{what} at offset {offset} needs {needed} bytes but the image is {len} bytes")]
    Truncated { what: &'static str, offset: usize, needed: usize, len: usize },

    #[error("unrecognized Mach-O magic {magic:#010x} at offset {offset}")]
    BadMagic { offset: usize, magic: u32 },

    #[error("fat header declares {count} architectures, more than the supported {max}")]
    TooManyArchitectures { count: u32, max: u32 },

    #[error("fat slice {index} starts at offset {offset}, beyond the image end ({len})")]
    SliceOutOfBounds { index: usize, offset: usize, len: usize },

    #[error("{ncmds} load commands cannot fit in {sizeofcmds} bytes")]
    CommandCountMismatch { ncmds: u32, sizeofcmds: u32 },

    #[error("load command {index} has invalid size {size}")]
    CommandTooSmall { index: usize, size: usize },

    #[error("load command {index} ({size} bytes at {offset}) extends past the command table")]
    CommandOutOfBounds { index: usize, offset: usize, size: usize },

    #[error("load command {index} has string offset {string_offset} outside its {size} bytes")]
    StringOutOfBounds { index: usize, string_offset: usize, size: usize },

    #[error("slice at offset {offset} is a relocatable object file, not a linked image")]
    ObjectFile { offset: usize },

    #[error("fat header declares no architectures")]
    NoArchitectures,
}

/// Reasons a single path field could not be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("replacement needs {needed} bytes but the slot holds {available}")]
    SlotTooSmall { needed: usize, available: usize },

    #[error("load command at slice {slice}, index {command} no longer holds the expected path")]
    StaleCommand { slice: usize, command: usize },
}

/// Failures that escape `scan`/`fix` for one file.
///
/// Decode and rewrite problems are folded into reports instead.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {path} with rewritten image: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NormalizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NormalizeError::Io { path: path.into(), source }
    }
}

/// Convenience result type for per-file operations.
pub type NormalizeResult<T> = Result<T, NormalizeError>;
