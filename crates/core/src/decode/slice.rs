//! Single-architecture slice decoder.

use goblin::mach::header::MH_OBJECT;
use goblin::mach::load_command::{
    LC_ID_DYLIB, LC_LAZY_LOAD_DYLIB, LC_LOAD_DYLIB, LC_LOAD_UPWARD_DYLIB, LC_LOAD_WEAK_DYLIB,
    LC_REEXPORT_DYLIB,
};
use log::debug;

use super::{arch_name, read_u32};
use crate::error::DecodeError;
use crate::model::{Bitness, ByteOrder, CommandKind, EmbeddedPath, LoadCommand, Slice};

/// Every load command starts with `cmd` and `cmdsize`.
const COMMAND_HEADER_SIZE: usize = 8;

/// Fixed part of `dylib_command`: cmd, cmdsize, name offset, timestamp,
/// current and compatibility versions.
const DYLIB_COMMAND_SIZE: usize = 24;

/// Map a raw `cmd` tag to the kind this crate cares about.
pub fn command_kind(cmd: u32) -> CommandKind {
    match cmd {
        LC_ID_DYLIB => CommandKind::Identity,
        LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB | LC_LOAD_UPWARD_DYLIB
        | LC_LAZY_LOAD_DYLIB => CommandKind::Dependency,
        _ => CommandKind::Other,
    }
}

/// Decode the slice starting at `offset` inside `bytes`.
///
/// The header, the declared command table, every command and every embedded
/// string are checked against the image length before they are read.
pub fn decode_slice(
    bytes: &[u8],
    offset: usize,
    bits: Bitness,
    order: ByteOrder,
) -> Result<Slice, DecodeError> {
    let len = bytes.len();
    let header_size = bits.header_size();
    if offset.checked_add(header_size).map_or(true, |end| end > len) {
        return Err(DecodeError::Truncated {
            what: "Mach-O header",
            offset,
            needed: header_size,
            len,
        });
    }

    let cputype = read_u32(bytes, offset + 4, order, "cputype")?;
    let cpusubtype = read_u32(bytes, offset + 8, order, "cpusubtype")?;
    let filetype = read_u32(bytes, offset + 12, order, "filetype")?;
    let ncmds = read_u32(bytes, offset + 16, order, "ncmds")?;
    let sizeofcmds = read_u32(bytes, offset + 20, order, "sizeofcmds")?;

    if filetype == MH_OBJECT {
        return Err(DecodeError::ObjectFile { offset });
    }

    let table_start = offset + header_size;
    let table_end = table_start
        .checked_add(sizeofcmds as usize)
        .filter(|end| *end <= len)
        .ok_or(DecodeError::Truncated {
            what: "load command table",
            offset: table_start,
            needed: sizeofcmds as usize,
            len,
        })?;
    if u64::from(ncmds) * COMMAND_HEADER_SIZE as u64 > u64::from(sizeofcmds) {
        return Err(DecodeError::CommandCountMismatch { ncmds, sizeofcmds });
    }

    debug!(
        "slice at {offset}: {}-bit {:?}, {ncmds} commands in {sizeofcmds} bytes",
        bits.bits(),
        order
    );

    let mut commands = Vec::with_capacity(ncmds as usize);
    let mut pos = table_start;
    for index in 0..ncmds as usize {
        if pos + COMMAND_HEADER_SIZE > table_end {
            return Err(DecodeError::CommandOutOfBounds {
                index,
                offset: pos - offset,
                size: COMMAND_HEADER_SIZE,
            });
        }
        let cmd = read_u32(bytes, pos, order, "cmd")?;
        let size = read_u32(bytes, pos + 4, order, "cmdsize")? as usize;
        if size < COMMAND_HEADER_SIZE {
            return Err(DecodeError::CommandTooSmall { index, size });
        }
        if pos.checked_add(size).map_or(true, |end| end > table_end) {
            return Err(DecodeError::CommandOutOfBounds { index, offset: pos - offset, size });
        }

        let kind = command_kind(cmd);
        let path = match kind {
            CommandKind::Other => None,
            CommandKind::Identity | CommandKind::Dependency => {
                Some(decode_path(bytes, pos, size, index, order)?)
            }
        };

        commands.push(LoadCommand { kind, cmd, offset: pos - offset, size, path });
        // Step by the declared size so unknown kinds never desynchronize the walk.
        pos += size;
    }

    Ok(Slice {
        arch: arch_name(cputype, cpusubtype),
        cputype,
        cpusubtype,
        filetype,
        offset,
        bits,
        byte_order: order,
        commands,
    })
}

fn decode_path(
    bytes: &[u8],
    pos: usize,
    size: usize,
    index: usize,
    order: ByteOrder,
) -> Result<EmbeddedPath, DecodeError> {
    if size < DYLIB_COMMAND_SIZE {
        return Err(DecodeError::CommandTooSmall { index, size });
    }
    let header = read_u32(bytes, pos + 8, order, "dylib name offset")? as usize;
    if header < DYLIB_COMMAND_SIZE || header >= size {
        return Err(DecodeError::StringOutOfBounds { index, string_offset: header, size });
    }

    let slot = &bytes[pos + header..pos + size];
    let stored_len = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
    let value = String::from_utf8_lossy(&slot[..stored_len]).into_owned();
    Ok(EmbeddedPath { value, header, stored_len })
}
