//! Peripherals consumed by the execution engine.
//!
//! The engine never owns a rendering, input or audio technology. It talks
//! to three capabilities:
//! - [`Display`]: a linear monochrome pixel plane
//! - [`Keyboard`]: press state of the 16 hex keys
//! - [`Speaker`]: a one-shot beep
//!
//! In-memory implementations are provided for front ends and tests.

mod display;
mod keyboard;
mod speaker;

pub use display::{FrameBuffer, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use keyboard::{Keypad, KEY_COUNT};
pub use speaker::{BeepCounter, SilentSpeaker};

use crate::error::Result;

/// A `width × height` plane of 0/1 pixels addressed by `width * y + x`.
pub trait Display {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Read a pixel. Fails with `OutOfRangeAddress` outside the plane.
    fn get(&self, offset: usize) -> Result<u8>;

    /// Write a pixel; any non-zero value turns it on.
    fn set(&mut self, offset: usize, value: u8) -> Result<()>;

    /// Turn every pixel off.
    fn clear(&mut self) -> Result<()> {
        for offset in 0..self.width() * self.height() {
            self.set(offset, 0)?;
        }
        Ok(())
    }
}

/// Press state of keys 0x0..=0xF.
pub trait Keyboard {
    /// Fails with `InvalidRegister` for keys above 0xF.
    fn is_pressed(&self, key: u8) -> Result<bool>;
}

/// Fire-and-forget audio trigger.
pub trait Speaker {
    fn beep(&mut self);
}

impl<T: Display + ?Sized> Display for &mut T {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn get(&self, offset: usize) -> Result<u8> {
        (**self).get(offset)
    }

    fn set(&mut self, offset: usize, value: u8) -> Result<()> {
        (**self).set(offset, value)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

impl<T: Keyboard + ?Sized> Keyboard for &T {
    fn is_pressed(&self, key: u8) -> Result<bool> {
        (**self).is_pressed(key)
    }
}

impl<T: Keyboard + ?Sized> Keyboard for &mut T {
    fn is_pressed(&self, key: u8) -> Result<bool> {
        (**self).is_pressed(key)
    }
}

impl<T: Speaker + ?Sized> Speaker for &mut T {
    fn beep(&mut self) {
        (**self).beep()
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn get(&self, offset: usize) -> Result<u8> {
        (**self).get(offset)
    }

    fn set(&mut self, offset: usize, value: u8) -> Result<()> {
        (**self).set(offset, value)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

impl<T: Speaker + ?Sized> Speaker for Box<T> {
    fn beep(&mut self) {
        (**self).beep()
    }
}
