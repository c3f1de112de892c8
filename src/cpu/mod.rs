//! CPU emulation for CHIP-8.
//!
//! This module implements the machine core:
//! - 4 KiB of byte memory with the font at 0x000 and programs at 0x200
//! - 16 eight-bit V registers, the I register, an even PC and a 16-level stack
//! - delay and sound timers ticked once per instruction
//! - the instruction subset listed in [`Opcode`], with switchable compatibility quirks

pub mod memory;
pub mod registers;
pub mod decode;
pub mod quirks;
pub mod state;
pub mod execute;

pub use memory::Memory;
pub use registers::Registers;
pub use decode::{Instruction, Opcode};
pub use quirks::Quirks;
pub use state::State;
pub use execute::{Cpu, Trace, TraceSink};
