//! Core data model for images, slices, and load commands.
//!
//! Everything here is transient: it is rebuilt from disk bytes on every
//! `scan`/`fix` call and never persisted.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Byte order of a single-architecture slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Pointer width of a slice. Decides the header size (28 or 32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bitness {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

impl Bitness {
    pub fn header_size(self) -> usize {
        match self {
            Bitness::Bits32 => goblin::mach::header::SIZEOF_HEADER_32,
            Bitness::Bits64 => goblin::mach::header::SIZEOF_HEADER_64,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }
}

/// How a load command is interpreted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// The library's own install name (`LC_ID_DYLIB`).
    Identity,
    /// A reference to another dylib (ordinary, weak, re-export, upward, lazy).
    Dependency,
    /// Anything else; carried only so the walk stays in sync.
    Other,
}

/// One entry of a slice's load-command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    pub kind: CommandKind,
    /// Raw `cmd` tag.
    pub cmd: u32,
    /// Offset of the command relative to the slice start.
    pub offset: usize,
    /// Declared `cmdsize`.
    pub size: usize,
    /// Embedded path, present for identity and dependency commands.
    pub path: Option<EmbeddedPath>,
}

impl LoadCommand {
    pub fn path_str(&self) -> Option<&str> {
        self.path.as_ref().map(|p| p.value.as_str())
    }
}

/// A null-terminated path stored inside a load command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedPath {
    /// Decoded string (lossy UTF-8), without the terminator.
    pub value: String,
    /// The `lc_str` offset, relative to the owning command's start.
    pub header: usize,
    /// Number of bytes the string occupies before its terminator.
    pub stored_len: usize,
}

impl EmbeddedPath {
    /// Bytes available to a replacement string, terminator included.
    pub fn slot_len(&self, command_size: usize) -> usize {
        command_size.saturating_sub(self.header)
    }
}

/// One CPU-architecture variant inside an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Architecture name, e.g. `x86_64` or `arm64`.
    pub arch: String,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    /// Byte offset of the slice inside the image.
    pub offset: usize,
    pub bits: Bitness,
    pub byte_order: ByteOrder,
    pub commands: Vec<LoadCommand>,
}

impl Slice {
    pub fn identity(&self) -> Option<&LoadCommand> {
        self.commands.iter().find(|c| c.kind == CommandKind::Identity)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &LoadCommand> {
        self.commands.iter().filter(|c| c.kind == CommandKind::Dependency)
    }

    /// Absolute byte range of a command's path slot within the image.
    pub fn path_slot(&self, command: &LoadCommand) -> Option<Range<usize>> {
        let path = command.path.as_ref()?;
        let start = self.offset + command.offset + path.header;
        let end = self.offset + command.offset + command.size;
        Some(start..end)
    }

    pub fn summary(&self) -> SliceSummary {
        SliceSummary {
            arch: self.arch.clone(),
            offset: self.offset as u64,
            bits: self.bits.bits(),
            byte_order: self.byte_order,
            identity: self.identity().and_then(|c| c.path_str()).map(str::to_string),
            dependencies: self
                .dependencies()
                .filter_map(|c| c.path_str())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// A decoded on-disk image: one slice for thin files, several for fat ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub len: usize,
    pub fat: bool,
    pub slices: Vec<Slice>,
}

/// Serializable view of a slice, attached to reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSummary {
    pub arch: String,
    pub offset: u64,
    pub bits: u8,
    pub byte_order: ByteOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub dependencies: Vec<String>,
}

/// Location of a load command inside an image, stable across re-decodes of
/// the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandRef {
    pub slice: usize,
    pub command: usize,
}
