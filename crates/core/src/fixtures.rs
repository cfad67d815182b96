//! Builders for small synthetic Mach-O dylib images.
//!
//! Used by the test suites of this crate and of the CLI. The images carry a
//! real header and load-command table followed by filler bytes standing in
//! for segment contents.

use goblin::mach::header::{MH_DYLIB, MH_MAGIC, MH_MAGIC_64};
use goblin::mach::load_command::{LC_ID_DYLIB, LC_LOAD_DYLIB};

pub use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};
pub use goblin::mach::load_command::{
    LC_LAZY_LOAD_DYLIB, LC_LOAD_UPWARD_DYLIB, LC_LOAD_WEAK_DYLIB, LC_REEXPORT_DYLIB, LC_UUID,
};

use crate::model::ByteOrder;

/// `CPU_SUBTYPE_X86_64_ALL`.
pub const CPU_SUBTYPE_X86_64_ALL: u32 = 3;

/// Default image length; comfortably above the default stub threshold.
pub const DEFAULT_IMAGE_LEN: usize = 64 * 1024;

/// Alignment of slices inside fat images built by [`fat`].
pub const FAT_SLICE_ALIGN: usize = 4096;

#[derive(Debug, Clone)]
enum Command {
    Dylib { cmd: u32, path: String, slot: Option<usize> },
    Other { cmd: u32, size: usize },
}

/// Builder for a thin dylib image.
#[derive(Debug, Clone)]
pub struct DylibBuilder {
    bits64: bool,
    order: ByteOrder,
    cputype: u32,
    cpusubtype: u32,
    filetype: u32,
    commands: Vec<Command>,
    min_len: usize,
}

impl Default for DylibBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DylibBuilder {
    /// A 64-bit little-endian x86_64 dylib with no load commands.
    pub fn new() -> Self {
        Self {
            bits64: true,
            order: ByteOrder::Little,
            cputype: CPU_TYPE_X86_64,
            cpusubtype: CPU_SUBTYPE_X86_64_ALL,
            filetype: MH_DYLIB,
            commands: Vec::new(),
            min_len: DEFAULT_IMAGE_LEN,
        }
    }

    pub fn bits32(mut self) -> Self {
        self.bits64 = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.order = ByteOrder::Big;
        self
    }

    pub fn cpu(mut self, cputype: u32, cpusubtype: u32) -> Self {
        self.cputype = cputype;
        self.cpusubtype = cpusubtype;
        self
    }

    pub fn filetype(mut self, filetype: u32) -> Self {
        self.filetype = filetype;
        self
    }

    /// Pad the finished image with filler up to `len` bytes.
    pub fn min_len(mut self, len: usize) -> Self {
        self.min_len = len;
        self
    }

    pub fn identity(self, path: &str) -> Self {
        self.dylib(LC_ID_DYLIB, path, None)
    }

    /// Identity whose string slot is exactly `slot` bytes, terminator included.
    pub fn identity_with_slot(self, path: &str, slot: usize) -> Self {
        self.dylib(LC_ID_DYLIB, path, Some(slot))
    }

    pub fn dependency(self, path: &str) -> Self {
        self.dylib(LC_LOAD_DYLIB, path, None)
    }

    pub fn dependency_with_slot(self, path: &str, slot: usize) -> Self {
        self.dylib(LC_LOAD_DYLIB, path, Some(slot))
    }

    /// Dependency recorded with a specific command tag (weak, lazy, ...).
    pub fn dependency_kind(self, cmd: u32, path: &str) -> Self {
        self.dylib(cmd, path, None)
    }

    /// An uninterpreted command of `size` bytes (at least 8).
    pub fn other(mut self, cmd: u32, size: usize) -> Self {
        self.commands.push(Command::Other { cmd, size: size.max(8) });
        self
    }

    fn dylib(mut self, cmd: u32, path: &str, slot: Option<usize>) -> Self {
        self.commands.push(Command::Dylib { cmd, path: path.to_string(), slot });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let align = if self.bits64 { 8 } else { 4 };
        let mut table = Vec::new();
        for command in &self.commands {
            match command {
                Command::Dylib { cmd, path, slot } => {
                    let slot_len = slot.unwrap_or_else(|| align_up(path.len() + 1, align));
                    put_u32(&mut table, self.order, *cmd);
                    put_u32(&mut table, self.order, (24 + slot_len) as u32);
                    put_u32(&mut table, self.order, 24);
                    put_u32(&mut table, self.order, 2);
                    put_u32(&mut table, self.order, 0x0001_0000);
                    put_u32(&mut table, self.order, 0x0001_0000);
                    let mut slot_bytes = path.as_bytes().to_vec();
                    slot_bytes.resize(slot_len, 0);
                    table.extend_from_slice(&slot_bytes);
                }
                Command::Other { cmd, size } => {
                    put_u32(&mut table, self.order, *cmd);
                    put_u32(&mut table, self.order, *size as u32);
                    table.extend((8..*size).map(|i| (i as u8) | 0x80));
                }
            }
        }

        let mut out = Vec::new();
        let magic = if self.bits64 { MH_MAGIC_64 } else { MH_MAGIC };
        put_u32(&mut out, self.order, magic);
        put_u32(&mut out, self.order, self.cputype);
        put_u32(&mut out, self.order, self.cpusubtype);
        put_u32(&mut out, self.order, self.filetype);
        put_u32(&mut out, self.order, self.commands.len() as u32);
        put_u32(&mut out, self.order, table.len() as u32);
        put_u32(&mut out, self.order, 0x0010_0085);
        if self.bits64 {
            put_u32(&mut out, self.order, 0);
        }
        out.extend_from_slice(&table);

        let filler_start = out.len();
        if self.min_len > filler_start {
            out.extend((filler_start..self.min_len).map(|i| (i % 251) as u8 | 1));
        }
        out
    }
}

/// Wrap thin images into a fat container, each slice aligned to
/// [`FAT_SLICE_ALIGN`]. CPU type fields are copied from each slice header.
pub fn fat(slices: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xcafe_babeu32.to_be_bytes());
    out.extend_from_slice(&(slices.len() as u32).to_be_bytes());

    let mut offsets = Vec::with_capacity(slices.len());
    let mut next = FAT_SLICE_ALIGN;
    for slice in slices {
        offsets.push(next);
        next = align_up(next + slice.len(), FAT_SLICE_ALIGN);
    }

    for (slice, offset) in slices.iter().zip(&offsets) {
        let order = slice_order(slice);
        out.extend_from_slice(&read_u32(slice, 4, order).to_be_bytes());
        out.extend_from_slice(&read_u32(slice, 8, order).to_be_bytes());
        out.extend_from_slice(&(*offset as u32).to_be_bytes());
        out.extend_from_slice(&(slice.len() as u32).to_be_bytes());
        out.extend_from_slice(&12u32.to_be_bytes());
    }

    for (slice, offset) in slices.iter().zip(&offsets) {
        out.resize(*offset, 0);
        out.extend_from_slice(slice);
    }
    out
}

fn slice_order(slice: &[u8]) -> ByteOrder {
    match slice.first() {
        Some(0xfe) => ByteOrder::Big,
        _ => ByteOrder::Little,
    }
}

fn read_u32(bytes: &[u8], offset: usize, order: ByteOrder) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    order.read_u32(word)
}

fn put_u32(out: &mut Vec<u8>, order: ByteOrder, value: u32) {
    match order {
        ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
        ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
    }
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}
