//! CHIP-8 main memory.
//!
//! 4 KiB of byte-addressable memory. The interpreter area below 0x200 holds
//! the hexadecimal font glyphs at [`FONT_BASE`]; programs are loaded at
//! [`ENTRY_POINT`].

use crate::error::{Result, VmError};

/// The number of addressable bytes.
pub const MEMORY_SIZE: usize = 0x1000;

/// Address of the first program byte and the initial program counter.
pub const ENTRY_POINT: u16 = 0x200;

/// Address of the first font glyph.
pub const FONT_BASE: u16 = 0x000;

/// Bytes per font glyph.
pub const GLYPH_SIZE: u16 = 5;

/// Maximum program length that fits above the entry point.
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - ENTRY_POINT as usize;

/// Glyphs `0`..`F`, 4 pixels wide and 5 rows tall, high nibble significant.
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// CHIP-8 memory: 4096 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8; MEMORY_SIZE]>,
}

impl Memory {
    /// Create a new memory with all bytes zeroed.
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0; MEMORY_SIZE]),
        }
    }

    /// Read a byte.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(VmError::OutOfRangeAddress(addr))
    }

    /// Write a byte.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<()> {
        let cell = self
            .bytes
            .get_mut(addr)
            .ok_or(VmError::OutOfRangeAddress(addr))?;
        *cell = value;
        Ok(())
    }

    /// Borrow `len` bytes starting at `addr`.
    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8]> {
        Self::check_span(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }

    /// Fail unless `addr..addr + len` lies inside memory.
    pub fn check_span(addr: usize, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let last = addr.saturating_add(len - 1);
        if last >= MEMORY_SIZE {
            return Err(VmError::OutOfRangeAddress(last));
        }
        Ok(())
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Write the font glyphs at [`FONT_BASE`].
    pub fn load_font(&mut self) {
        let base = FONT_BASE as usize;
        self.bytes[base..base + FONT.len()].copy_from_slice(&FONT);
    }

    /// Copy a program into memory starting at [`ENTRY_POINT`].
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        if program.len() > MAX_PROGRAM_SIZE {
            return Err(VmError::ProgramTooLarge {
                size: program.len(),
                available: MAX_PROGRAM_SIZE,
            });
        }

        let start = ENTRY_POINT as usize;
        self.bytes[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start.min(end)..end).map(|i| (i, self.bytes[i])).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero bytes
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &MEMORY_SIZE)
            .finish()
    }
}
