//! CHIP-8 registers.
//!
//! - V0..VF: 8-bit general registers (VF doubles as the flag register)
//! - I: 16-bit index register
//! - PC: program counter, always even
//! - a 16-level return stack
//! - delay and sound timers

use crate::cpu::memory::{ENTRY_POINT, MEMORY_SIZE};
use crate::error::{Result, VmError};
use serde::{Deserialize, Serialize};

/// The number of V registers.
pub const REGISTER_COUNT: usize = 16;

/// Return stack capacity.
pub const STACK_DEPTH: usize = 16;

/// The flag register index.
pub const VF: u8 = 0xF;

/// Check that `addr` is an even address inside memory.
pub fn check_instruction_address(addr: i32) -> Result<u16> {
    if addr < 0 || addr as usize >= MEMORY_SIZE || addr % 2 != 0 {
        return Err(VmError::InvalidAddress(addr));
    }
    Ok(addr as u16)
}

/// Fixed-capacity return stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    slots: [u16; STACK_DEPTH],
    depth: usize,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a return address, which must satisfy the program counter invariant.
    pub fn push(&mut self, addr: u16) -> Result<()> {
        if self.depth == STACK_DEPTH {
            return Err(VmError::StackOverflow);
        }
        let addr = check_instruction_address(addr as i32)?;
        self.slots[self.depth] = addr;
        self.depth += 1;
        Ok(())
    }

    /// Pop the most recently pushed address.
    pub fn pop(&mut self) -> Result<u16> {
        if self.depth == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.depth -= 1;
        Ok(self.slots[self.depth])
    }

    /// The address `pop` would return.
    pub fn top(&self) -> Option<u16> {
        self.depth.checked_sub(1).map(|top| self.slots[top])
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_full(&self) -> bool {
        self.depth == STACK_DEPTH
    }

    /// Stored addresses, oldest first.
    pub fn frames(&self) -> &[u16] {
        &self.slots[..self.depth]
    }

    pub fn clear(&mut self) {
        self.slots = [0; STACK_DEPTH];
        self.depth = 0;
    }
}

/// The CHIP-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    v: [u8; REGISTER_COUNT],

    /// I: index register, used as a memory address
    pub i: u16,

    pc: u16,

    /// Return addresses pushed by `2nnn`
    pub stack: Stack,

    /// Delay timer, counts down once per step while non-zero
    pub delay: u8,

    /// Sound timer, beeps and counts down once per step while non-zero
    pub sound: u8,
}

impl Registers {
    /// Create a register file with PC at the entry point and everything else zeroed.
    pub fn new() -> Self {
        Self {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: ENTRY_POINT,
            stack: Stack::new(),
            delay: 0,
            sound: 0,
        }
    }

    /// Reset all registers.
    pub fn reset(&mut self) {
        self.v = [0; REGISTER_COUNT];
        self.i = 0;
        self.pc = ENTRY_POINT;
        self.stack.clear();
        self.delay = 0;
        self.sound = 0;
    }

    /// Read a V register.
    pub fn v(&self, reg: u8) -> Result<u8> {
        self.v
            .get(reg as usize)
            .copied()
            .ok_or(VmError::InvalidRegister(reg))
    }

    /// Write a V register; the value wraps at 256.
    pub fn set_v(&mut self, reg: u8, value: u16) -> Result<()> {
        let slot = self
            .v
            .get_mut(reg as usize)
            .ok_or(VmError::InvalidRegister(reg))?;
        *slot = (value & 0xFF) as u8;
        Ok(())
    }

    /// All V registers.
    pub fn v_all(&self) -> &[u8; REGISTER_COUNT] {
        &self.v
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Set the program counter to an absolute, even address.
    pub fn jump(&mut self, addr: i32) -> Result<()> {
        self.pc = check_instruction_address(addr)?;
        Ok(())
    }

    /// Move the program counter by `delta` bytes.
    pub fn advance_pc(&mut self, delta: i32) -> Result<()> {
        self.jump(self.pc as i32 + delta)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_address_check() {
        assert_eq!(check_instruction_address(0x200), Ok(0x200));
        assert_eq!(check_instruction_address(0xFFE), Ok(0xFFE));
        assert_eq!(check_instruction_address(0x201), Err(VmError::InvalidAddress(0x201)));
        assert_eq!(check_instruction_address(0x1000), Err(VmError::InvalidAddress(0x1000)));
        assert_eq!(check_instruction_address(-2), Err(VmError::InvalidAddress(-2)));
    }

    #[test]
    fn test_stack_lifo() {
        let mut stack = Stack::new();
        stack.push(0x200).unwrap();
        stack.push(0x300).unwrap();

        assert_eq!(stack.frames(), &[0x200, 0x300]);
        assert_eq!(stack.top(), Some(0x300));
        assert_eq!(stack.pop(), Ok(0x300));
        assert_eq!(stack.pop(), Ok(0x200));
        assert_eq!(stack.pop(), Err(VmError::StackUnderflow));
    }

    #[test]
    fn test_stack_overflow() {
        let mut stack = Stack::new();
        for n in 0..STACK_DEPTH as u16 {
            stack.push(0x200 + n * 2).unwrap();
        }

        assert!(stack.is_full());
        assert_eq!(stack.push(0x400), Err(VmError::StackOverflow));
        assert_eq!(stack.depth(), STACK_DEPTH);
    }

    #[test]
    fn test_stack_rejects_odd_address() {
        let mut stack = Stack::new();
        assert_eq!(stack.push(0x201), Err(VmError::InvalidAddress(0x201)));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_v_wraps() {
        let mut regs = Registers::new();
        regs.set_v(3, 300).unwrap();
        assert_eq!(regs.v(3), Ok(44));
        assert_eq!(regs.v(16), Err(VmError::InvalidRegister(16)));
        assert_eq!(regs.set_v(16, 0), Err(VmError::InvalidRegister(16)));
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.advance_pc(2).unwrap();
        assert_eq!(regs.pc(), 0x202);

        assert_eq!(regs.advance_pc(1), Err(VmError::InvalidAddress(0x203)));
        assert_eq!(regs.pc(), 0x202);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set_v(0, 9).unwrap();
        regs.i = 0x123;
        regs.delay = 4;
        regs.stack.push(0x204).unwrap();
        regs.jump(0x400).unwrap();

        regs.reset();
        assert_eq!(regs, Registers::new());
    }
}
