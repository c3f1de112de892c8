//! Speakers that do not produce sound.

use super::Speaker;

/// Ignores every beep.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn beep(&mut self) {}
}

/// Counts beeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BeepCounter {
    pub count: u64,
}

impl BeepCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Speaker for BeepCounter {
    fn beep(&mut self) {
        self.count += 1;
    }
}
