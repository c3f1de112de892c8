//! Terminal player for CHIP-8 programs.
//!
//! Provides an interactive terminal front end with:
//! - The 64×32 screen drawn with half-block characters
//! - Register and timer view
//! - Run/pause and reset controls
//! - Hex keypad on 0-9/a-f, with arrows on 2/4/6/8

mod app;
mod ui;

pub use app::{PlayerApp, TerminalBell, run_player};
