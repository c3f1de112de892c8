//! Compatibility switches.
//!
//! CHIP-8 interpreters disagree on a handful of instructions. The defaults
//! reproduce this machine's historical behaviour; [`Quirks::canonical`]
//! selects the commonly documented one.

use serde::{Deserialize, Serialize};

/// Which register the shift instructions (8xy6, 8xyE) read and write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSource {
    /// Shift Vy in place.
    #[default]
    Vy,
    /// Shift Vx in place.
    Vx,
}

/// When the draw instruction raises VF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionRule {
    /// Any incoming bit equal to the pixel under it (two unset pixels included).
    #[default]
    Equal,
    /// A set pixel was turned off.
    Erased,
}

/// Where Fx33 writes its digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BcdLayout {
    /// Every digit pass targets `I+1`; after three passes only `I+1` changes.
    #[default]
    Literal,
    /// Hundreds at `I`, tens at `I+1`, ones at `I+2`.
    Canonical,
}

/// Accepted range for delay/sound timer writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerBound {
    /// 0..=254; writing 255 fails with `TimerOutOfRange`.
    #[default]
    Below255,
    /// 0..=255.
    Full,
}

impl TimerBound {
    pub fn accepts(self, value: u8) -> bool {
        match self {
            TimerBound::Below255 => value < 255,
            TimerBound::Full => true,
        }
    }
}

/// The full set of compatibility switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quirks {
    pub shift: ShiftSource,
    pub collision: CollisionRule,
    pub bcd: BcdLayout,
    pub timer_bound: TimerBound,
}

impl Quirks {
    /// Historical behaviour (the default).
    pub fn literal() -> Self {
        Self::default()
    }

    /// Behaviour described by the common CHIP-8 references.
    pub fn canonical() -> Self {
        Self {
            shift: ShiftSource::Vx,
            collision: CollisionRule::Erased,
            bcd: BcdLayout::Canonical,
            timer_bound: TimerBound::Full,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "literal" => Some(Self::literal()),
            "canonical" => Some(Self::canonical()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_literal() {
        let quirks = Quirks::default();
        assert_eq!(quirks.shift, ShiftSource::Vy);
        assert_eq!(quirks.collision, CollisionRule::Equal);
        assert_eq!(quirks.bcd, BcdLayout::Literal);
        assert_eq!(quirks.timer_bound, TimerBound::Below255);
    }

    #[test]
    fn test_timer_bound() {
        assert!(TimerBound::Below255.accepts(254));
        assert!(!TimerBound::Below255.accepts(255));
        assert!(TimerBound::Full.accepts(255));
    }

    #[test]
    fn test_partial_json() {
        let quirks: Quirks = serde_json::from_str(r#"{"shift": "vx", "bcd": "canonical"}"#).unwrap();
        assert_eq!(quirks.shift, ShiftSource::Vx);
        assert_eq!(quirks.bcd, BcdLayout::Canonical);
        assert_eq!(quirks.collision, CollisionRule::Equal);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Quirks::preset("Canonical"), Some(Quirks::canonical()));
        assert_eq!(Quirks::preset("literal"), Some(Quirks::literal()));
        assert_eq!(Quirks::preset("schip"), None);
    }
}
