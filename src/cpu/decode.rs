//! Instruction decoder for CHIP-8.
//!
//! Every instruction is two bytes, big-endian. The high nibble of the first
//! byte selects an opcode family; families `0x0`, `0x8`, `0xE` and `0xF`
//! are further split on the low byte or the low nibble.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw view of the two bytes at `[PC, PC+1]`.
///
/// | Field     | Bits                           |
/// |-----------|--------------------------------|
/// | `nibble0` | high nibble of `byte0` (family)|
/// | `nibble1` | low nibble of `byte0` (x)      |
/// | `nibble2` | high nibble of `byte1` (y)     |
/// | `nibble3` | low nibble of `byte1` (n)      |
/// | `address` | `nibble1` and `byte1` (nnn)    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub byte0: u8,
    pub byte1: u8,
    pub nibble0: u8,
    pub nibble1: u8,
    pub nibble2: u8,
    pub nibble3: u8,
    pub address: u16,
}

impl Instruction {
    /// Split two instruction bytes into their fields.
    pub const fn from_bytes(byte0: u8, byte1: u8) -> Self {
        Self {
            byte0,
            byte1,
            nibble0: byte0 >> 4,
            nibble1: byte0 & 0x0F,
            nibble2: byte1 >> 4,
            nibble3: byte1 & 0x0F,
            address: ((byte0 as u16 & 0x0F) << 8) | byte1 as u16,
        }
    }

    /// Split a big-endian instruction word.
    pub const fn from_word(word: u16) -> Self {
        Self::from_bytes((word >> 8) as u8, word as u8)
    }

    /// The instruction as a big-endian word.
    pub const fn word(&self) -> u16 {
        (self.byte0 as u16) << 8 | self.byte1 as u16
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.word())
    }
}

/// Decoded CHIP-8 instruction.
///
/// Operand naming: `x`/`y` are register indices, `kk` an 8-bit immediate,
/// `addr` a 12-bit address and `n` a 4-bit row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Flow ====================

    /// 00EE: PC := pop() (any `0xEE` low byte in family 0)
    Return,

    /// 1nnn: PC := nnn
    Jump { addr: u16 },

    /// 2nnn: push PC, PC := nnn
    Call { addr: u16 },

    /// 3xkk: skip next if Vx == kk
    SkipIfEqual { x: u8, kk: u8 },

    /// 4xkk: skip next if Vx != kk
    SkipIfNotEqual { x: u8, kk: u8 },

    /// 5xy0: skip next if Vx == Vy
    SkipIfRegistersEqual { x: u8, y: u8 },

    // ==================== Arithmetic ====================

    /// 6xkk: Vx := kk
    Load { x: u8, kk: u8 },

    /// 7xkk: Vx := Vx + kk (no carry flag)
    AddImmediate { x: u8, kk: u8 },

    /// 8xy0: Vx := Vy
    Move { x: u8, y: u8 },

    /// 8xy2: Vx := Vx AND Vy
    And { x: u8, y: u8 },

    /// 8xy4: Vx := Vx + Vy, VF := carry
    Add { x: u8, y: u8 },

    /// 8xy5: VF := Vx > Vy, Vx := Vx - Vy
    Sub { x: u8, y: u8 },

    /// 8xy6: VF := low bit, shift right by one
    ShiftRight { x: u8, y: u8 },

    /// 8xyE: VF := high bit, shift left by one
    ShiftLeft { x: u8, y: u8 },

    // ==================== Index ====================

    /// Annn: I := nnn
    LoadIndex { addr: u16 },

    /// Fx1E: I := I + Vx
    AddIndex { x: u8 },

    /// Fx29: I := font base + Vx * 5
    LoadGlyph { x: u8 },

    // ==================== Devices ====================

    /// Cxkk: Vx := random AND kk
    Random { x: u8, kk: u8 },

    /// Dxyn: draw n sprite rows from I at (Vx, Vy)
    Draw { x: u8, y: u8, n: u8 },

    /// ExA1: skip next if key Vx is not pressed
    SkipIfKeyUp { x: u8 },

    /// Fx07: Vx := delay timer
    ReadDelay { x: u8 },

    /// Fx15: delay timer := Vx
    SetDelay { x: u8 },

    /// Fx18: sound timer := Vx
    SetSound { x: u8 },

    // ==================== Memory ====================

    /// Fx33: BCD of Vx into memory at I
    StoreBcd { x: u8 },

    /// Fx55: memory[I..=I+x] := V0..=Vx
    StoreRegisters { x: u8 },

    /// Fx65: V0..=Vx := memory[I..=I+x]
    LoadRegisters { x: u8 },
}

/// Decode a raw instruction. Returns `None` for unassigned patterns.
pub fn decode(instr: Instruction) -> Option<Opcode> {
    let Instruction {
        byte1,
        nibble0,
        nibble1: x,
        nibble2: y,
        nibble3: n,
        address: addr,
        ..
    } = instr;
    let kk = byte1;

    let opcode = match (nibble0, x, y, n) {
        (0x0, ..) if kk == 0xEE => Opcode::Return,
        (0x1, ..) => Opcode::Jump { addr },
        (0x2, ..) => Opcode::Call { addr },
        (0x3, ..) => Opcode::SkipIfEqual { x, kk },
        (0x4, ..) => Opcode::SkipIfNotEqual { x, kk },
        (0x5, _, _, 0x0) => Opcode::SkipIfRegistersEqual { x, y },
        (0x6, ..) => Opcode::Load { x, kk },
        (0x7, ..) => Opcode::AddImmediate { x, kk },
        (0x8, _, _, 0x0) => Opcode::Move { x, y },
        (0x8, _, _, 0x2) => Opcode::And { x, y },
        (0x8, _, _, 0x4) => Opcode::Add { x, y },
        (0x8, _, _, 0x5) => Opcode::Sub { x, y },
        (0x8, _, _, 0x6) => Opcode::ShiftRight { x, y },
        (0x8, _, _, 0xE) => Opcode::ShiftLeft { x, y },
        (0xA, ..) => Opcode::LoadIndex { addr },
        (0xC, ..) => Opcode::Random { x, kk },
        (0xD, ..) => Opcode::Draw { x, y, n },
        (0xE, ..) if kk == 0xA1 => Opcode::SkipIfKeyUp { x },
        (0xF, ..) => match kk {
            0x07 => Opcode::ReadDelay { x },
            0x15 => Opcode::SetDelay { x },
            0x18 => Opcode::SetSound { x },
            0x1E => Opcode::AddIndex { x },
            0x29 => Opcode::LoadGlyph { x },
            0x33 => Opcode::StoreBcd { x },
            0x55 => Opcode::StoreRegisters { x },
            0x65 => Opcode::LoadRegisters { x },
            _ => return None,
        },
        _ => return None,
    };

    Some(opcode)
}

/// Encode an opcode back to its instruction word.
pub fn encode(opcode: &Opcode) -> u16 {
    fn xkk(family: u16, x: u8, kk: u8) -> u16 {
        family << 12 | (x as u16 & 0xF) << 8 | kk as u16
    }
    fn xyn(family: u16, x: u8, y: u8, n: u8) -> u16 {
        family << 12 | (x as u16 & 0xF) << 8 | (y as u16 & 0xF) << 4 | (n as u16 & 0xF)
    }
    fn nnn(family: u16, addr: u16) -> u16 {
        family << 12 | (addr & 0x0FFF)
    }

    match *opcode {
        Opcode::Return => 0x00EE,
        Opcode::Jump { addr } => nnn(0x1, addr),
        Opcode::Call { addr } => nnn(0x2, addr),
        Opcode::SkipIfEqual { x, kk } => xkk(0x3, x, kk),
        Opcode::SkipIfNotEqual { x, kk } => xkk(0x4, x, kk),
        Opcode::SkipIfRegistersEqual { x, y } => xyn(0x5, x, y, 0x0),
        Opcode::Load { x, kk } => xkk(0x6, x, kk),
        Opcode::AddImmediate { x, kk } => xkk(0x7, x, kk),
        Opcode::Move { x, y } => xyn(0x8, x, y, 0x0),
        Opcode::And { x, y } => xyn(0x8, x, y, 0x2),
        Opcode::Add { x, y } => xyn(0x8, x, y, 0x4),
        Opcode::Sub { x, y } => xyn(0x8, x, y, 0x5),
        Opcode::ShiftRight { x, y } => xyn(0x8, x, y, 0x6),
        Opcode::ShiftLeft { x, y } => xyn(0x8, x, y, 0xE),
        Opcode::LoadIndex { addr } => nnn(0xA, addr),
        Opcode::Random { x, kk } => xkk(0xC, x, kk),
        Opcode::Draw { x, y, n } => xyn(0xD, x, y, n),
        Opcode::SkipIfKeyUp { x } => xkk(0xE, x, 0xA1),
        Opcode::ReadDelay { x } => xkk(0xF, x, 0x07),
        Opcode::SetDelay { x } => xkk(0xF, x, 0x15),
        Opcode::SetSound { x } => xkk(0xF, x, 0x18),
        Opcode::AddIndex { x } => xkk(0xF, x, 0x1E),
        Opcode::LoadGlyph { x } => xkk(0xF, x, 0x29),
        Opcode::StoreBcd { x } => xkk(0xF, x, 0x33),
        Opcode::StoreRegisters { x } => xkk(0xF, x, 0x55),
        Opcode::LoadRegisters { x } => xkk(0xF, x, 0x65),
    }
}

/// Encode a sequence of opcodes into program bytes.
pub fn assemble(opcodes: &[Opcode]) -> Vec<u8> {
    opcodes
        .iter()
        .flat_map(|op| encode(op).to_be_bytes())
        .collect()
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Opcode::Return => write!(f, "RET"),
            Opcode::Jump { addr } => write!(f, "JP 0x{:03X}", addr),
            Opcode::Call { addr } => write!(f, "CALL 0x{:03X}", addr),
            Opcode::SkipIfEqual { x, kk } => write!(f, "SE V{:X}, 0x{:02X}", x, kk),
            Opcode::SkipIfNotEqual { x, kk } => write!(f, "SNE V{:X}, 0x{:02X}", x, kk),
            Opcode::SkipIfRegistersEqual { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            Opcode::Load { x, kk } => write!(f, "LD V{:X}, 0x{:02X}", x, kk),
            Opcode::AddImmediate { x, kk } => write!(f, "ADD V{:X}, 0x{:02X}", x, kk),
            Opcode::Move { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Opcode::And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Opcode::Add { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Opcode::Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            Opcode::ShiftRight { x, y } => write!(f, "SHR V{:X}, V{:X}", x, y),
            Opcode::ShiftLeft { x, y } => write!(f, "SHL V{:X}, V{:X}", x, y),
            Opcode::LoadIndex { addr } => write!(f, "LD I, 0x{:03X}", addr),
            Opcode::AddIndex { x } => write!(f, "ADD I, V{:X}", x),
            Opcode::LoadGlyph { x } => write!(f, "LD F, V{:X}", x),
            Opcode::Random { x, kk } => write!(f, "RND V{:X}, 0x{:02X}", x, kk),
            Opcode::Draw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Opcode::SkipIfKeyUp { x } => write!(f, "SKNP V{:X}", x),
            Opcode::ReadDelay { x } => write!(f, "LD V{:X}, DT", x),
            Opcode::SetDelay { x } => write!(f, "LD DT, V{:X}", x),
            Opcode::SetSound { x } => write!(f, "LD ST, V{:X}", x),
            Opcode::StoreBcd { x } => write!(f, "LD B, V{:X}", x),
            Opcode::StoreRegisters { x } => write!(f, "LD [I], V{:X}", x),
            Opcode::LoadRegisters { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
