//! Fat (universal) container decoder.
//!
//! The fat header and architecture records are big-endian whatever the byte
//! order of the slices they point at.

use goblin::mach::fat::{SIZEOF_FAT_ARCH, SIZEOF_FAT_HEADER};
use log::debug;

use super::{decode_slice, read_u32};
use crate::error::DecodeError;
use crate::format::thin_layout;
use crate::model::{ByteOrder, Slice};

/// Upper bound on declared architectures; real images carry two or three.
pub const MAX_FAT_ARCHES: u32 = 64;

/// Offset of the `offset` field inside a `fat_arch` record.
const FAT_ARCH_OFFSET_FIELD: usize = 8;

/// Decode every slice listed in the fat header of `bytes`.
pub fn decode_fat(bytes: &[u8]) -> Result<Vec<Slice>, DecodeError> {
    let len = bytes.len();
    let count = read_u32(bytes, 4, ByteOrder::Big, "fat architecture count")?;
    if count == 0 {
        return Err(DecodeError::NoArchitectures);
    }
    if count > MAX_FAT_ARCHES {
        return Err(DecodeError::TooManyArchitectures { count, max: MAX_FAT_ARCHES });
    }

    let table_len = count as usize * SIZEOF_FAT_ARCH;
    if SIZEOF_FAT_HEADER + table_len > len {
        return Err(DecodeError::Truncated {
            what: "fat architecture table",
            offset: SIZEOF_FAT_HEADER,
            needed: table_len,
            len,
        });
    }

    let mut slices = Vec::with_capacity(count as usize);
    for index in 0..count as usize {
        let record = SIZEOF_FAT_HEADER + index * SIZEOF_FAT_ARCH;
        let offset =
            read_u32(bytes, record + FAT_ARCH_OFFSET_FIELD, ByteOrder::Big, "fat slice offset")?
                as usize;
        if offset >= len {
            return Err(DecodeError::SliceOutOfBounds { index, offset, len });
        }

        let magic = read_u32(bytes, offset, ByteOrder::Big, "slice magic")?;
        let (bits, order) = thin_layout(magic).ok_or(DecodeError::BadMagic { offset, magic })?;
        debug!("fat slice {index} at {offset}: magic {magic:#010x}");
        slices.push(decode_slice(bytes, offset, bits, order)?);
    }

    Ok(slices)
}
