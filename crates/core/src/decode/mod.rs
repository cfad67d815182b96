//! Bounds-checked decoding of thin and fat Mach-O images.
//!
//! A single decoder serves every caller. All reads go through [`read_u32`],
//! which fails instead of reading past the image.

pub mod fat;
pub mod slice;

use goblin::mach::fat::{FAT_CIGAM, FAT_MAGIC};

use crate::error::DecodeError;
use crate::format::thin_layout;
use crate::model::{ByteOrder, Image};

pub use fat::decode_fat;
pub use slice::decode_slice;

/// Decode every slice of an image held in memory.
pub fn decode_image(bytes: &[u8]) -> Result<Image, DecodeError> {
    let magic = read_u32(bytes, 0, ByteOrder::Big, "magic")?;
    if magic == FAT_MAGIC || magic == FAT_CIGAM {
        let slices = decode_fat(bytes)?;
        return Ok(Image { len: bytes.len(), fat: true, slices });
    }

    let (bits, order) = thin_layout(magic).ok_or(DecodeError::BadMagic { offset: 0, magic })?;
    let slice = decode_slice(bytes, 0, bits, order)?;
    Ok(Image { len: bytes.len(), fat: false, slices: vec![slice] })
}

/// Read a `u32` at `offset`, failing if it would cross the end of `bytes`.
pub(crate) fn read_u32(
    bytes: &[u8],
    offset: usize,
    order: ByteOrder,
    what: &'static str,
) -> Result<u32, DecodeError> {
    let end = offset.checked_add(4).filter(|end| *end <= bytes.len()).ok_or(
        DecodeError::Truncated { what, offset, needed: 4, len: bytes.len() },
    )?;
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..end]);
    Ok(order.read_u32(word))
}

/// Human-readable architecture name for a CPU type/subtype pair.
pub fn arch_name(cputype: u32, cpusubtype: u32) -> String {
    // Capability bits in the high byte of the subtype are not part of the name.
    let subtype = cpusubtype & !goblin::mach::cputype::CPU_SUBTYPE_MASK;
    goblin::mach::cputype::get_arch_name_from_types(cputype, subtype)
        .map(str::to_string)
        .unwrap_or_else(|| format!("cpu-{cputype:#x}"))
}
