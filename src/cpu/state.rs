//! The machine state store.
//!
//! [`State`] owns memory, registers, stack and timers for one loaded
//! program and enforces their structural invariants: addresses in range,
//! an even program counter, at most 16 return addresses, registers
//! 0x0..=0xF. Violations are reported as [`VmError`]s, never clamped,
//! except that V register writes wrap at 256.

use crate::cpu::decode::Instruction;
use crate::cpu::memory::{Memory, FONT_BASE, MAX_PROGRAM_SIZE};
use crate::cpu::quirks::TimerBound;
use crate::cpu::registers::Registers;
use crate::error::{Result, VmError};

/// Memory, registers, stack and timers of a running program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State {
    mem: Memory,
    regs: Registers,
    program: Vec<u8>,
    timer_bound: TimerBound,
}

impl State {
    /// Create the state for `program` and reset it.
    pub fn new(program: &[u8]) -> Result<Self> {
        check_program(program)?;

        let mut state = Self {
            mem: Memory::new(),
            regs: Registers::new(),
            program: program.to_vec(),
            timer_bound: TimerBound::default(),
        };
        state.reset();
        Ok(state)
    }

    /// Use a different timer write bound.
    pub fn with_timer_bound(mut self, bound: TimerBound) -> Self {
        self.timer_bound = bound;
        self
    }

    pub fn set_timer_bound(&mut self, bound: TimerBound) {
        self.timer_bound = bound;
    }

    /// Zero memory, write the font and the program, and clear every register.
    pub fn reset(&mut self) {
        self.mem.clear();
        self.mem.load_font();
        let loaded = self.mem.load_program(&self.program);
        debug_assert!(loaded.is_ok(), "program length is checked on acceptance");
        self.regs.reset();
        log::debug!("state reset with {} program bytes", self.program.len());
    }

    /// Replace the loaded program, then reset.
    pub fn load(&mut self, program: &[u8]) -> Result<()> {
        check_program(program)?;
        self.program = program.to_vec();
        self.reset();
        Ok(())
    }

    /// The program bytes written at the entry point on reset.
    pub fn program(&self) -> &[u8] {
        &self.program
    }

    // ==================== Memory ====================

    pub fn byte(&self, offset: usize) -> Result<u8> {
        self.mem.read(offset)
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        self.mem.write(offset, value)
    }

    /// The two bytes at PC and PC+1.
    pub fn instruction(&self) -> Result<Instruction> {
        let pc = self.regs.pc() as usize;
        let byte0 = self.mem.read(pc)?;
        let byte1 = self.mem.read(pc + 1)?;
        Ok(Instruction::from_bytes(byte0, byte1))
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Address of the first font glyph.
    pub fn font_base(&self) -> u16 {
        FONT_BASE
    }

    // ==================== Stack ====================

    /// Push a return address, the current PC if `addr` is `None`.
    pub fn push_return(&mut self, addr: Option<u16>) -> Result<()> {
        let addr = addr.unwrap_or(self.regs.pc());
        self.regs.stack.push(addr)
    }

    pub fn pop_return(&mut self) -> Result<u16> {
        self.regs.stack.pop()
    }

    /// The address `pop_return` would yield, without removing it.
    pub fn peek_return(&self) -> Result<u16> {
        self.regs.stack.top().ok_or(VmError::StackUnderflow)
    }

    pub fn stack_depth(&self) -> usize {
        self.regs.stack.depth()
    }

    pub fn stack_is_full(&self) -> bool {
        self.regs.stack.is_full()
    }

    // ==================== Program counter ====================

    pub fn pc(&self) -> u16 {
        self.regs.pc()
    }

    pub fn set_pc(&mut self, addr: u16) -> Result<()> {
        self.regs.jump(addr as i32)
    }

    /// `set_pc(pc + delta)`.
    pub fn advance_pc(&mut self, delta: i32) -> Result<()> {
        self.regs.advance_pc(delta)
    }

    // ==================== Registers ====================

    pub fn v(&self, reg: u8) -> Result<u8> {
        self.regs.v(reg)
    }

    /// Store `value` modulo 256.
    pub fn set_v(&mut self, reg: u8, value: u16) -> Result<()> {
        self.regs.set_v(reg, value)
    }

    /// Add to a register with 8-bit wraparound.
    pub fn add_v(&mut self, reg: u8, delta: u16) -> Result<()> {
        let value = self.regs.v(reg)? as u16;
        self.regs.set_v(reg, value.wrapping_add(delta))
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn i(&self) -> u16 {
        self.regs.i
    }

    /// No range check; callers keep I addressable.
    pub fn set_i(&mut self, value: u16) {
        self.regs.i = value;
    }

    // ==================== Timers ====================

    pub fn delay(&self) -> u8 {
        self.regs.delay
    }

    pub fn set_delay(&mut self, value: u8) -> Result<()> {
        self.check_timer(value)?;
        self.regs.delay = value;
        Ok(())
    }

    pub fn sound(&self) -> u8 {
        self.regs.sound
    }

    pub fn set_sound(&mut self, value: u8) -> Result<()> {
        self.check_timer(value)?;
        self.regs.sound = value;
        Ok(())
    }

    fn check_timer(&self, value: u8) -> Result<()> {
        if self.timer_bound.accepts(value) {
            Ok(())
        } else {
            Err(VmError::TimerOutOfRange(value))
        }
    }
}

fn check_program(program: &[u8]) -> Result<()> {
    if program.len() > MAX_PROGRAM_SIZE {
        return Err(VmError::ProgramTooLarge {
            size: program.len(),
            available: MAX_PROGRAM_SIZE,
        });
    }
    Ok(())
}
