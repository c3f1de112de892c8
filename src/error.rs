//! Error taxonomy shared by the state store, the engine and the devices.
//!
//! Every variant is fatal to the step (or tick) that raised it. Nothing
//! inside the crate retries or recovers; the caller decides whether to
//! reset, reload or report.

use crate::cpu::decode::Instruction;
use thiserror::Error;

/// Errors raised while executing a CHIP-8 program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Memory or display access outside valid bounds.
    #[error("address 0x{0:04X} is out of range")]
    OutOfRangeAddress(usize),

    /// Program counter or stack target that is odd or outside memory.
    #[error("invalid instruction address {0:#06x}")]
    InvalidAddress(i32),

    /// Register or key index outside 0x0..=0xF.
    #[error("register or key index {0:#x} does not exist")]
    InvalidRegister(u8),

    #[error("stack overflow (16 return addresses already stored)")]
    StackOverflow,

    #[error("stack underflow (return with an empty stack)")]
    StackUnderflow,

    /// No opcode matches the decoded instruction.
    #[error("unsupported instruction {instruction}{}", previous_suffix(.previous))]
    UnsupportedInstruction {
        instruction: Instruction,
        previous: Option<Instruction>,
    },

    /// Timer write rejected by the `Below255` timer bound.
    #[error("timer value {0} is out of range")]
    TimerOutOfRange(u8),

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

fn previous_suffix(previous: &Option<Instruction>) -> String {
    match previous {
        Some(instr) => format!(" (after {})", instr),
        None => String::new(),
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_mentions_previous() {
        let err = VmError::UnsupportedInstruction {
            instruction: Instruction::from_bytes(0x0F, 0xFF),
            previous: Some(Instruction::from_bytes(0x60, 0x05)),
        };
        let text = err.to_string();
        assert!(text.contains("0x0FFF"));
        assert!(text.contains("after 0x6005"));
    }

    #[test]
    fn test_unsupported_message_without_previous() {
        let err = VmError::UnsupportedInstruction {
            instruction: Instruction::from_bytes(0xB1, 0x23),
            previous: None,
        };
        assert_eq!(err.to_string(), "unsupported instruction 0xB123");
    }
}
