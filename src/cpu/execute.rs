//! CPU execution engine for CHIP-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! One call to [`Cpu::step`] is one virtual cycle:
//!
//! 1. fetch the two bytes at PC and hand them to the trace sink
//! 2. decode; unassigned patterns fail here, before anything changes
//! 3. count the delay timer down; count the sound timer down and beep
//! 4. execute
//! 5. move PC to the next instruction, the one after it (skips), or the
//!    branch target
//!
//! Everything an instruction will need is validated before it writes: the
//! slot after it (unless it branches), its operands and its targets. The
//! timers are the exception. They tick before execution, so an instruction
//! that then fails leaves that tick in place.

use crate::cpu::decode::{self, Instruction, Opcode};
use crate::cpu::memory::{Memory, GLYPH_SIZE};
use crate::cpu::quirks::{BcdLayout, CollisionRule, Quirks, ShiftSource};
use crate::cpu::registers::{check_instruction_address, VF};
use crate::cpu::state::State;
use crate::devices::{Display, FrameBuffer, Keyboard, Keypad, SilentSpeaker, Speaker};
use crate::error::{Result, VmError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Diagnostic record emitted for every fetched instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Address the instruction was fetched from.
    pub pc: u16,
    pub instruction: Instruction,
}

/// Observer receiving a [`Trace`] per step. Purely observational.
pub type TraceSink = Box<dyn FnMut(&Trace)>;

/// Where PC goes once an instruction has executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Skip,
    Jump(u16),
}

/// The CHIP-8 CPU with its peripherals.
pub struct Cpu<D = FrameBuffer, K = Keypad, S = SilentSpeaker> {
    state: State,
    display: D,
    keyboard: K,
    speaker: S,
    quirks: Quirks,
    rng: StdRng,
    trace: Option<TraceSink>,
    /// Instruction count (for profiling).
    cycles: u64,
    /// Last executed instruction (for diagnostics).
    last_instr: Option<Instruction>,
}

impl<D: Display, K: Keyboard, S: Speaker> Cpu<D, K, S> {
    /// Create a CPU over a loaded state and its peripherals.
    pub fn new(state: State, display: D, keyboard: K, speaker: S) -> Self {
        let quirks = Quirks::default();
        let mut state = state;
        state.set_timer_bound(quirks.timer_bound);

        Self {
            state,
            display,
            keyboard,
            speaker,
            quirks,
            rng: StdRng::from_entropy(),
            trace: None,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Select compatibility behaviour.
    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.set_quirks(quirks);
        self
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
        self.state.set_timer_bound(quirks.timer_bound);
    }

    /// Use a deterministic random source for `Cxkk`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Attach a trace sink.
    pub fn with_trace(mut self, sink: impl FnMut(&Trace) + 'static) -> Self {
        self.trace = Some(Box::new(sink));
        self
    }

    /// Reset the state store and blank the display.
    pub fn reset(&mut self) -> Result<()> {
        self.state.reset();
        self.display.clear()?;
        self.cycles = 0;
        self.last_instr = None;
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error.
    pub fn step(&mut self) -> Result<Opcode> {
        // Fetch
        let pc = self.state.pc();
        let instr = self.state.instruction()?;
        if let Some(sink) = self.trace.as_mut() {
            sink(&Trace {
                pc,
                instruction: instr,
            });
        }

        // Decode
        let opcode = decode::decode(instr).ok_or(VmError::UnsupportedInstruction {
            instruction: instr,
            previous: self.last_instr,
        })?;
        log::trace!("{:03X}: {}", pc, opcode);

        // Anything that can fall through needs a slot after it
        if !matches!(opcode, Opcode::Jump { .. } | Opcode::Call { .. } | Opcode::Return) {
            check_instruction_address(pc as i32 + 2)?;
        }

        self.tick_timers()?;

        // Execute
        match self.execute(opcode)? {
            Flow::Next => self.state.advance_pc(2)?,
            Flow::Skip => self.state.advance_pc(4)?,
            Flow::Jump(target) => self.state.set_pc(target)?,
        }

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(opcode)
    }

    /// Execute `count` steps, stopping at the first error.
    ///
    /// Returns the number of instructions executed.
    pub fn run_batch(&mut self, count: u32) -> Result<u64> {
        let start_cycles = self.cycles;

        for _ in 0..count {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn tick_timers(&mut self) -> Result<()> {
        let delay = self.state.delay();
        if delay > 0 {
            self.state.set_delay(delay - 1)?;
        }

        let sound = self.state.sound();
        if sound > 0 {
            self.speaker.beep();
            self.state.set_sound(sound - 1)?;
        }

        Ok(())
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, opcode: Opcode) -> Result<Flow> {
        let flow = match opcode {
            // ==================== Flow ====================

            Opcode::Return => {
                let target = self.state.peek_return()? as i32 + 2;
                let target = check_instruction_address(target)?;
                self.state.pop_return()?;
                Flow::Jump(target)
            }

            Opcode::Jump { addr } => Flow::Jump(check_instruction_address(addr as i32)?),

            Opcode::Call { addr } => {
                let target = check_instruction_address(addr as i32)?;
                self.state.push_return(None)?;
                Flow::Jump(target)
            }

            Opcode::SkipIfEqual { x, kk } => skip_if(self.state.v(x)? == kk),

            Opcode::SkipIfNotEqual { x, kk } => skip_if(self.state.v(x)? != kk),

            Opcode::SkipIfRegistersEqual { x, y } => {
                skip_if(self.state.v(x)? == self.state.v(y)?)
            }

            // ==================== Arithmetic ====================

            Opcode::Load { x, kk } => {
                self.state.set_v(x, kk as u16)?;
                Flow::Next
            }

            Opcode::AddImmediate { x, kk } => {
                self.state.add_v(x, kk as u16)?;
                Flow::Next
            }

            Opcode::Move { x, y } => {
                let value = self.state.v(y)?;
                self.state.set_v(x, value as u16)?;
                Flow::Next
            }

            Opcode::And { x, y } => {
                let value = self.state.v(x)? & self.state.v(y)?;
                self.state.set_v(x, value as u16)?;
                Flow::Next
            }

            Opcode::Add { x, y } => {
                let sum = self.state.v(x)? as u16 + self.state.v(y)? as u16;
                self.state.set_v(x, sum)?;
                self.state.set_v(VF, u16::from(sum > 0xFF))?;
                Flow::Next
            }

            Opcode::Sub { x, y } => {
                let (vx, vy) = (self.state.v(x)?, self.state.v(y)?);
                self.state.set_v(VF, u16::from(vx > vy))?;
                self.state.set_v(x, vx.wrapping_sub(vy) as u16)?;
                Flow::Next
            }

            Opcode::ShiftRight { x, y } => {
                let reg = self.shift_register(x, y);
                let value = self.state.v(reg)?;
                self.state.set_v(VF, (value & 0x01) as u16)?;
                self.state.set_v(reg, (value >> 1) as u16)?;
                Flow::Next
            }

            Opcode::ShiftLeft { x, y } => {
                let reg = self.shift_register(x, y);
                let value = self.state.v(reg)?;
                self.state.set_v(VF, (value >> 7) as u16)?;
                self.state.set_v(reg, (value as u16) << 1)?;
                Flow::Next
            }

            // ==================== Index ====================

            Opcode::LoadIndex { addr } => {
                self.state.set_i(addr);
                Flow::Next
            }

            Opcode::AddIndex { x } => {
                let value = self.state.i().wrapping_add(self.state.v(x)? as u16);
                self.state.set_i(value);
                Flow::Next
            }

            Opcode::LoadGlyph { x } => {
                let glyph = self.state.v(x)? as u16 * GLYPH_SIZE;
                self.state.set_i(self.state.font_base() + glyph);
                Flow::Next
            }

            // ==================== Devices ====================

            Opcode::Random { x, kk } => {
                let value: u8 = self.rng.gen();
                self.state.set_v(x, (value & kk) as u16)?;
                Flow::Next
            }

            Opcode::Draw { x, y, n } => {
                let collision = self.draw(x, y, n)?;
                self.state.set_v(VF, u16::from(collision))?;
                Flow::Next
            }

            Opcode::SkipIfKeyUp { x } => {
                let key = self.state.v(x)?;
                skip_if(!self.keyboard.is_pressed(key)?)
            }

            Opcode::ReadDelay { x } => {
                self.state.set_v(x, self.state.delay() as u16)?;
                Flow::Next
            }

            Opcode::SetDelay { x } => {
                self.state.set_delay(self.state.v(x)?)?;
                Flow::Next
            }

            Opcode::SetSound { x } => {
                self.state.set_sound(self.state.v(x)?)?;
                Flow::Next
            }

            // ==================== Memory ====================

            Opcode::StoreBcd { x } => {
                let value = self.state.v(x)?;
                match self.quirks.bcd {
                    BcdLayout::Literal => self.store_bcd_literal(value)?,
                    BcdLayout::Canonical => self.store_bcd_canonical(value)?,
                }
                Flow::Next
            }

            Opcode::StoreRegisters { x } => {
                let base = self.state.i() as usize;
                Self::check_register_span(base, x)?;
                for reg in 0..=x {
                    let value = self.state.v(reg)?;
                    self.state.set_byte(base + reg as usize, value)?;
                }
                Flow::Next
            }

            Opcode::LoadRegisters { x } => {
                let base = self.state.i() as usize;
                Self::check_register_span(base, x)?;
                for reg in 0..=x {
                    let value = self.state.byte(base + reg as usize)?;
                    self.state.set_v(reg, value as u16)?;
                }
                Flow::Next
            }
        };

        Ok(flow)
    }

    fn shift_register(&self, x: u8, y: u8) -> u8 {
        match self.quirks.shift {
            ShiftSource::Vy => y,
            ShiftSource::Vx => x,
        }
    }

    fn check_register_span(base: usize, x: u8) -> Result<()> {
        if x as usize >= crate::cpu::registers::REGISTER_COUNT {
            return Err(VmError::InvalidRegister(x));
        }
        Memory::check_span(base, x as usize + 1)
    }

    /// XOR `rows` sprite rows from I onto the display at (Vx, Vy).
    ///
    /// Both coordinates wrap around the plane. Returns the collision flag.
    fn draw(&mut self, x: u8, y: u8, rows: u8) -> Result<bool> {
        let origin_x = self.state.v(x)? as usize;
        let origin_y = self.state.v(y)? as usize;
        let sprite = self
            .state
            .memory()
            .slice(self.state.i() as usize, rows as usize)?
            .to_vec();

        let (width, height) = (self.display.width(), self.display.height());
        if width == 0 || height == 0 {
            return Err(VmError::OutOfRangeAddress(0));
        }

        let mut collision = false;
        for (row, bits) in sprite.iter().enumerate() {
            let py = (origin_y + row) % height;
            for col in 0..8 {
                let px = (origin_x + col) % width;
                let offset = width * py + px;

                let incoming = (bits >> (7 - col)) & 0x01;
                let existing = u8::from(self.display.get(offset)? != 0);

                collision |= match self.quirks.collision {
                    CollisionRule::Equal => incoming == existing,
                    CollisionRule::Erased => incoming & existing == 1,
                };
                self.display.set(offset, incoming ^ existing)?;
            }
        }

        Ok(collision)
    }

    /// Fx33 as this machine historically ran it: three passes that all
    /// target `I+1`, each storing a digit and then folding the next digit
    /// in shifted by four. Only `I+1` is written; it ends up 0.
    fn store_bcd_literal(&mut self, value: u8) -> Result<()> {
        let addr = self.state.i() as usize + 1;
        Memory::check_span(addr, 1)?;

        let mut value = value as u32;
        for _ in 0..3 {
            self.state.set_byte(addr, (value % 10) as u8)?;
            value /= 10;
            let folded = (self.state.byte(addr)? as u32 + value % 10) << 4;
            self.state.set_byte(addr, folded as u8)?;
            value /= 10;
        }
        Ok(())
    }

    fn store_bcd_canonical(&mut self, value: u8) -> Result<()> {
        let base = self.state.i() as usize;
        Memory::check_span(base, 3)?;

        self.state.set_byte(base, value / 100)?;
        self.state.set_byte(base + 1, value / 10 % 10)?;
        self.state.set_byte(base + 2, value % 10)?;
        Ok(())
    }
}

impl<D, K, S> Cpu<D, K, S> {
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    pub fn speaker(&self) -> &S {
        &self.speaker
    }

    pub fn speaker_mut(&mut self) -> &mut S {
        &mut self.speaker
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// Completed steps since creation or the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }
}

fn skip_if(condition: bool) -> Flow {
    if condition {
        Flow::Skip
    } else {
        Flow::Next
    }
}

impl<D, K, S> std::fmt::Debug for Cpu<D, K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycles", &self.cycles)
            .field("quirks", &self.quirks)
            .field("regs", self.state.registers())
            .finish()
    }
}
