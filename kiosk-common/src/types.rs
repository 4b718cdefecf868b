//! Core value types shared by every input source and the scheduler

use serde::{Deserialize, Serialize};

/// Discrete rotary selector position, 0-based.
///
/// The range upper bound (`P - 1`) is a property of the loaded configuration,
/// so range checks live with whoever owns the boundaries
/// (see [`Position::clamped`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(usize);

impl Position {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Build a position clamped into `[0, count - 1]`
    pub fn clamped(index: i64, count: usize) -> Self {
        let max = count.saturating_sub(1) as i64;
        Self(index.clamp(0, max) as usize)
    }

    /// 0-based index into per-position tables
    pub const fn index(self) -> usize {
        self.0
    }

    /// 1-based number used in external naming and the serial protocol
    pub const fn number(self) -> usize {
        self.0 + 1
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Playback variant selected by the mode switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Standard,
    Alternative,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Standard, Mode::Alternative];

    /// Map a raw switch reading: zero is Standard, anything else Alternative
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Mode::Standard
        } else {
            Mode::Alternative
        }
    }

    /// Short prefix used in transition file names
    pub fn prefix(self) -> &'static str {
        match self {
            Mode::Standard => "std",
            Mode::Alternative => "alt",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Mode::Standard => Mode::Alternative,
            Mode::Alternative => Mode::Standard,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Standard => write!(f, "standard"),
            Mode::Alternative => write!(f, "alternative"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_clamped() {
        assert_eq!(Position::clamped(-3, 4), Position::new(0));
        assert_eq!(Position::clamped(2, 4), Position::new(2));
        assert_eq!(Position::clamped(9, 4), Position::new(3));
    }

    #[test]
    fn test_position_display_is_one_based() {
        assert_eq!(Position::new(0).to_string(), "1");
        assert_eq!(Position::new(3).number(), 4);
    }

    #[test]
    fn test_mode_from_raw() {
        assert_eq!(Mode::from_raw(0), Mode::Standard);
        assert_eq!(Mode::from_raw(1), Mode::Alternative);
        assert_eq!(Mode::from_raw(7), Mode::Alternative);
    }

    #[test]
    fn test_mode_prefix_and_other() {
        assert_eq!(Mode::Standard.prefix(), "std");
        assert_eq!(Mode::Alternative.prefix(), "alt");
        assert_eq!(Mode::Standard.other(), Mode::Alternative);
    }

    #[test]
    fn test_mode_serde_lowercase() {
        let json = serde_json::to_string(&Mode::Alternative).unwrap();
        assert_eq!(json, "\"alternative\"");
        let pos: Position = serde_json::from_str("2").unwrap();
        assert_eq!(pos, Position::new(2));
    }
}
