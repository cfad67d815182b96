//! Per-file reports: verdicts and typed problems.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::Format;
use crate::model::{CommandRef, SliceSummary};

/// Kinds of defects (and skip reasons) a scan can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    IdentityMismatch,
    AbsolutePathDependency,
    LoaderRelativeDependency,
    UnnormalizedVersionedDependency,
    Unparseable,
    Stub,
    ForeignFormat,
}

impl ProblemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::IdentityMismatch => "ID",
            ProblemKind::AbsolutePathDependency
            | ProblemKind::LoaderRelativeDependency
            | ProblemKind::UnnormalizedVersionedDependency => "LINK",
            ProblemKind::Unparseable => "ERROR",
            ProblemKind::Stub => "INFO",
            ProblemKind::ForeignFormat => "SKIP",
        }
    }

    /// True for defects in load-command paths, as opposed to skip reasons.
    pub fn is_path_defect(self) -> bool {
        matches!(
            self,
            ProblemKind::IdentityMismatch
                | ProblemKind::AbsolutePathDependency
                | ProblemKind::LoaderRelativeDependency
                | ProblemKind::UnnormalizedVersionedDependency
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub kind: ProblemKind,
    pub description: String,
    /// The load command the problem is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<CommandRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Path currently stored in the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    /// Canonical path the rewriter would store, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Problem {
    /// A problem about the file as a whole rather than one command.
    pub fn file_level(kind: ProblemKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            location: None,
            arch: None,
            current: None,
            replacement: None,
        }
    }

    /// Same defect at the same place, ignoring the free-form description.
    pub fn same_defect(&self, other: &Problem) -> bool {
        self.kind == other.kind
            && self.location == other.location
            && self.current == other.current
            && self.replacement == other.replacement
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{} [{}]: {}", self.kind.as_str(), arch, self.description),
            None => write!(f, "{}: {}", self.kind.as_str(), self.description),
        }
    }
}

/// One verdict per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Clean,
    Stub,
    Foreign,
    Unparseable,
    HasProblems,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Stub => "stub",
            Verdict::Foreign => "foreign",
            Verdict::Unparseable => "unparseable",
            Verdict::HasProblems => "has_problems",
        }
    }

    /// Stubs and foreign files are skipped rather than judged.
    pub fn is_skipped(self) -> bool {
        matches!(self, Verdict::Stub | Verdict::Foreign)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub path: PathBuf,
    /// Library base name derived from the file name.
    pub canonical_name: String,
    pub size: u64,
    pub format: Format,
    pub verdict: Verdict,
    #[serde(default)]
    pub slices: Vec<SliceSummary>,
    #[serde(default)]
    pub problems: Vec<Problem>,
}

impl Report {
    /// Problems that describe path defects (excludes skip reasons).
    pub fn defects(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.kind.is_path_defect())
    }
}
