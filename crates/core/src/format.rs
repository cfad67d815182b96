//! Format sniffing from leading magic bytes.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use goblin::mach::fat::{FAT_CIGAM, FAT_MAGIC};
use goblin::mach::header::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};
use serde::{Deserialize, Serialize};

use crate::error::{NormalizeError, NormalizeResult};
use crate::model::{Bitness, ByteOrder};

/// Bytes inspected to tell an all-zero placeholder from unknown content.
pub const PLACEHOLDER_SAMPLE_LEN: usize = 1024;

/// Coarse classification of a file by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Shorter than a magic number, or an all-zero sample.
    Placeholder,
    Gzip,
    Bzip2,
    Zip,
    Xz,
    /// Multi-architecture container.
    Fat,
    MachO64,
    MachO32,
    Unknown,
}

impl Format {
    /// Classify a sample taken from the start of a file.
    ///
    /// `sample` should hold the first 4 bytes; when those are all zero, pass up
    /// to [`PLACEHOLDER_SAMPLE_LEN`] bytes so placeholders can be confirmed.
    pub fn sniff(sample: &[u8]) -> Format {
        if sample.len() < 4 {
            return Format::Placeholder;
        }
        if sample.starts_with(&[0x1f, 0x8b]) {
            return Format::Gzip;
        }
        if sample.starts_with(b"BZh") {
            return Format::Bzip2;
        }
        if sample.starts_with(b"PK\x03\x04") {
            return Format::Zip;
        }
        if sample.starts_with(&[0xfd, 0x37, 0x7a, 0x58]) {
            return Format::Xz;
        }

        let magic = u32::from_be_bytes([sample[0], sample[1], sample[2], sample[3]]);
        match magic {
            FAT_MAGIC | FAT_CIGAM => Format::Fat,
            MH_MAGIC_64 | MH_CIGAM_64 => Format::MachO64,
            MH_MAGIC | MH_CIGAM => Format::MachO32,
            0 if sample.iter().all(|b| *b == 0) => Format::Placeholder,
            _ => Format::Unknown,
        }
    }

    /// True for anything the decoders understand.
    pub fn is_image(self) -> bool {
        matches!(self, Format::Fat | Format::MachO64 | Format::MachO32)
    }

    /// True for compressed containers this tool does not open.
    pub fn is_foreign(self) -> bool {
        matches!(self, Format::Gzip | Format::Bzip2 | Format::Zip | Format::Xz)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Placeholder => "EMPTY",
            Format::Gzip => "GZIP",
            Format::Bzip2 => "BZIP2",
            Format::Zip => "ZIP",
            Format::Xz => "XZ",
            Format::Fat => "MACHO_FAT",
            Format::MachO64 => "MACHO_64",
            Format::MachO32 => "MACHO_32",
            Format::Unknown => "UNKNOWN",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Format::Placeholder => "File is empty or contains only null bytes (placeholder)",
            Format::Gzip => "File is gzip compressed",
            Format::Bzip2 => "File is bzip2 compressed",
            Format::Zip => "File is zip compressed",
            Format::Xz => "File is xz compressed",
            Format::Fat => "Universal (fat) Mach-O binary",
            Format::MachO64 => "64-bit Mach-O binary",
            Format::MachO32 => "32-bit Mach-O binary",
            Format::Unknown => "Unknown format",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a thin Mach-O magic (read big-endian from the file) to its layout.
pub fn thin_layout(magic: u32) -> Option<(Bitness, ByteOrder)> {
    match magic {
        MH_MAGIC => Some((Bitness::Bits32, ByteOrder::Big)),
        MH_CIGAM => Some((Bitness::Bits32, ByteOrder::Little)),
        MH_MAGIC_64 => Some((Bitness::Bits64, ByteOrder::Big)),
        MH_CIGAM_64 => Some((Bitness::Bits64, ByteOrder::Little)),
        _ => None,
    }
}

/// Detect the format of the file at `path`.
///
/// Reads 4 bytes, plus up to [`PLACEHOLDER_SAMPLE_LEN`] when they are zero.
pub fn detect_format(path: &Path) -> NormalizeResult<Format> {
    let mut file = File::open(path).map_err(|e| NormalizeError::io(path, e))?;

    let mut magic = Vec::with_capacity(4);
    (&mut file).take(4).read_to_end(&mut magic).map_err(|e| NormalizeError::io(path, e))?;
    if magic.len() < 4 || magic != [0, 0, 0, 0] {
        return Ok(Format::sniff(&magic));
    }

    file.seek(SeekFrom::Start(0)).map_err(|e| NormalizeError::io(path, e))?;
    let mut sample = Vec::with_capacity(PLACEHOLDER_SAMPLE_LEN);
    file.take(PLACEHOLDER_SAMPLE_LEN as u64)
        .read_to_end(&mut sample)
        .map_err(|e| NormalizeError::io(path, e))?;
    Ok(Format::sniff(&sample))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_compressed_containers() {
        assert_eq!(Format::sniff(&[0x1f, 0x8b, 0x08, 0x00]), Format::Gzip);
        assert_eq!(Format::sniff(b"BZh91AY"), Format::Bzip2);
        assert_eq!(Format::sniff(b"PK\x03\x04rest"), Format::Zip);
        assert_eq!(Format::sniff(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]), Format::Xz);
    }

    #[test]
    fn sniffs_mach_o_variants_in_both_byte_orders() {
        assert_eq!(Format::sniff(&[0xca, 0xfe, 0xba, 0xbe]), Format::Fat);
        assert_eq!(Format::sniff(&[0xbe, 0xba, 0xfe, 0xca]), Format::Fat);
        assert_eq!(Format::sniff(&[0xfe, 0xed, 0xfa, 0xcf]), Format::MachO64);
        assert_eq!(Format::sniff(&[0xcf, 0xfa, 0xed, 0xfe]), Format::MachO64);
        assert_eq!(Format::sniff(&[0xfe, 0xed, 0xfa, 0xce]), Format::MachO32);
        assert_eq!(Format::sniff(&[0xce, 0xfa, 0xed, 0xfe]), Format::MachO32);
    }

    #[test]
    fn zero_sample_is_placeholder_only_when_fully_zero() {
        assert_eq!(Format::sniff(&[0u8; 1024]), Format::Placeholder);
        let mut sample = vec![0u8; 1024];
        sample[700] = 1;
        assert_eq!(Format::sniff(&sample), Format::Unknown);
    }

    #[test]
    fn short_sample_is_placeholder() {
        assert_eq!(Format::sniff(&[]), Format::Placeholder);
        assert_eq!(Format::sniff(&[0xca, 0xfe]), Format::Placeholder);
    }

    #[test]
    fn thin_layout_matches_file_byte_order() {
        assert_eq!(thin_layout(0xcffa_edfe), Some((Bitness::Bits64, ByteOrder::Little)));
        assert_eq!(thin_layout(0xfeed_face), Some((Bitness::Bits32, ByteOrder::Big)));
        assert_eq!(thin_layout(0xcafe_babe), None);
    }
}
