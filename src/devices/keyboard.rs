//! Hex keypad state.
//!
//! ```text
//! 1 2 3 C
//! 4 5 6 D
//! 7 8 9 E
//! A 0 B F
//! ```

use super::Keyboard;
use crate::error::{Result, VmError};

/// The number of keys on the pad.
pub const KEY_COUNT: usize = 16;

/// Press state of the 16 hex keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keypad {
    pressed: [bool; KEY_COUNT],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: u8) -> Result<()> {
        self.set(key, true)
    }

    pub fn release(&mut self, key: u8) -> Result<()> {
        self.set(key, false)
    }

    pub fn set(&mut self, key: u8, pressed: bool) -> Result<()> {
        let slot = self
            .pressed
            .get_mut(key as usize)
            .ok_or(VmError::InvalidRegister(key))?;
        *slot = pressed;
        Ok(())
    }

    pub fn release_all(&mut self) {
        self.pressed = [false; KEY_COUNT];
    }

    /// Keys currently held, ascending.
    pub fn held(&self) -> impl Iterator<Item = u8> + '_ {
        self.pressed
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(key, _)| key as u8)
    }

    /// Map a typed character to its key: the hex digit itself.
    pub fn key_for_char(c: char) -> Option<u8> {
        c.to_digit(16).map(|d| d as u8)
    }

    /// Map a key name to its key: a single hex digit, or one of the arrow
    /// names, which stand in for 2/4/6/8.
    pub fn key_for_name(name: &str) -> Option<u8> {
        match name {
            "ArrowDown" => Some(0x2),
            "ArrowLeft" => Some(0x4),
            "ArrowRight" => Some(0x6),
            "ArrowUp" => Some(0x8),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::key_for_char(c),
                    _ => None,
                }
            }
        }
    }
}

impl Keyboard for Keypad {
    fn is_pressed(&self, key: u8) -> Result<bool> {
        self.pressed
            .get(key as usize)
            .copied()
            .ok_or(VmError::InvalidRegister(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_release() {
        let mut pad = Keypad::new();
        pad.press(0xA).unwrap();
        pad.press(3).unwrap();

        assert_eq!(pad.is_pressed(0xA), Ok(true));
        assert_eq!(pad.held().collect::<Vec<_>>(), vec![3, 0xA]);

        pad.release(0xA).unwrap();
        assert_eq!(pad.is_pressed(0xA), Ok(false));

        pad.release_all();
        assert_eq!(pad.held().count(), 0);
    }

    #[test]
    fn test_invalid_key() {
        let mut pad = Keypad::new();
        assert_eq!(pad.is_pressed(16), Err(VmError::InvalidRegister(16)));
        assert_eq!(pad.press(16), Err(VmError::InvalidRegister(16)));
    }

    #[test]
    fn test_key_for_char() {
        assert_eq!(Keypad::key_for_char('0'), Some(0));
        assert_eq!(Keypad::key_for_char('b'), Some(0xB));
        assert_eq!(Keypad::key_for_char('F'), Some(0xF));
        assert_eq!(Keypad::key_for_char('g'), None);
    }

    #[test]
    fn test_key_for_name() {
        assert_eq!(Keypad::key_for_name("ArrowUp"), Some(8));
        assert_eq!(Keypad::key_for_name("ArrowDown"), Some(2));
        assert_eq!(Keypad::key_for_name("c"), Some(0xC));
        assert_eq!(Keypad::key_for_name("cc"), None);
        assert_eq!(Keypad::key_for_name("Enter"), None);
    }
}
