//! # CHIP-8 VM
//!
//! A CHIP-8 virtual machine: a byte-addressed interpreter for the classic
//! 8-bit opcode set, the state store it mutates, and a drift-correcting
//! scheduler that runs batches of instructions at a steady rate.
//!
//! Peripherals are injected through the [`Display`], [`Keyboard`] and
//! [`Speaker`] traits, so the same core drives the terminal player, the
//! browser build and headless tests.

pub mod error;
pub mod cpu;
pub mod devices;
pub mod scheduler;
pub mod config;
pub mod machine;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use error::{Result, VmError};
pub use cpu::{Cpu, Instruction, Memory, Opcode, Quirks, Registers, State, Trace};
pub use devices::{BeepCounter, Display, FrameBuffer, Keyboard, Keypad, SilentSpeaker, Speaker};
pub use scheduler::{Clock, Scheduler, Subscription, SystemClock, Tick};
pub use config::{load_rom, Config, ConfigError};
pub use machine::Machine;

#[cfg(feature = "tui")]
pub use tui::run_player;
