//! WebAssembly bindings for the CHIP-8 VM.
//!
//! The page drives execution from its own animation loop by calling
//! `tick()`, which runs one batch of instructions.

use wasm_bindgen::prelude::*;
use crate::config::Config;
use crate::cpu::{Cpu, State};
use crate::devices::{BeepCounter, FrameBuffer, Keypad};
use crate::cpu::quirks::Quirks;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    cpu: Cpu<FrameBuffer, Keypad, BeepCounter>,
    batch: u32,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine for a ROM image with the default settings.
    #[wasm_bindgen(constructor)]
    pub fn new(rom: &[u8]) -> Result<WasmMachine, JsError> {
        Self::build(rom, &Config::default())
    }

    /// Create a machine with a JSON config.
    #[wasm_bindgen]
    pub fn with_config(rom: &[u8], config: &str) -> Result<WasmMachine, JsError> {
        let config = Config::from_json(config).map_err(js_error)?;
        Self::build(rom, &config)
    }

    /// Use a quirk preset, `"literal"` or `"canonical"`.
    #[wasm_bindgen]
    pub fn set_quirks(&mut self, preset: &str) -> Result<(), JsError> {
        let quirks = Quirks::preset(preset)
            .ok_or_else(|| JsError::new(&format!("unknown quirk preset {}", preset)))?;
        self.cpu.set_quirks(quirks);
        Ok(())
    }

    /// Run one batch. An error leaves the machine where it stopped.
    #[wasm_bindgen]
    pub fn tick(&mut self) -> Result<u32, JsError> {
        let done = self.cpu.run_batch(self.batch).map_err(js_error)?;
        Ok(done as u32)
    }

    /// Execute a single instruction. Returns its mnemonic.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let opcode = self.cpu.step().map_err(js_error)?;
        Ok(opcode.to_string())
    }

    #[wasm_bindgen]
    pub fn key_down(&mut self, key: u8) -> Result<(), JsError> {
        self.cpu.keyboard_mut().press(key).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn key_up(&mut self, key: u8) -> Result<(), JsError> {
        self.cpu.keyboard_mut().release(key).map_err(js_error)
    }

    /// Map a DOM `KeyboardEvent.key` to a keypad key, or -1.
    #[wasm_bindgen]
    pub fn key_for(name: &str) -> i32 {
        Keypad::key_for_name(name).map_or(-1, i32::from)
    }

    /// Pixel plane, one byte (0 or 1) per pixel, row-major.
    #[wasm_bindgen]
    pub fn pixels(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.cpu.display().as_bytes())
    }

    #[wasm_bindgen]
    pub fn width(&self) -> usize {
        crate::devices::Display::width(self.cpu.display())
    }

    #[wasm_bindgen]
    pub fn height(&self) -> usize {
        crate::devices::Display::height(self.cpu.display())
    }

    /// Reset to the freshly loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.cpu.reset().map_err(js_error)
    }

    /// Total beeps so far.
    #[wasm_bindgen]
    pub fn beeps(&self) -> u64 {
        self.cpu.speaker().count
    }

    /// Whether the sound timer is running.
    #[wasm_bindgen]
    pub fn sounding(&self) -> bool {
        self.cpu.state().sound() > 0
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.state().pc()
    }

    /// V0..VF.
    #[wasm_bindgen]
    pub fn registers(&self) -> Vec<u8> {
        self.cpu.state().registers().v_all().to_vec()
    }
}

impl WasmMachine {
    fn build(rom: &[u8], config: &Config) -> Result<WasmMachine, JsError> {
        let state = State::new(rom).map_err(js_error)?;
        let display = FrameBuffer::new(config.display_width, config.display_height);
        let cpu = Cpu::new(state, display, Keypad::new(), BeepCounter::new())
            .with_quirks(config.quirks);

        Ok(Self {
            cpu,
            batch: config.batch_size(),
        })
    }
}
