//! Mode switch watcher

use kiosk_common::Mode;

/// Mode change reported by [`ModeWatcher::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub old: Mode,
    pub new: Mode,
}

/// Maps raw switch readings to a [`Mode`] and reports real changes only.
///
/// The first observation establishes the mode without producing a change.
/// Callers sample at a fixed cadence; one reading is authoritative.
#[derive(Debug, Clone, Default)]
pub struct ModeWatcher {
    last: Option<Mode>,
}

impl ModeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watcher that already knows the mode, so the next differing reading is a change
    pub fn with_initial(mode: Mode) -> Self {
        Self { last: Some(mode) }
    }

    /// Current mode, Standard until the first observation
    pub fn current(&self) -> Mode {
        self.last.unwrap_or_default()
    }

    /// True once any reading has been observed
    pub fn has_reading(&self) -> bool {
        self.last.is_some()
    }

    /// Record a raw switch value (zero = Standard, non-zero = Alternative)
    pub fn observe(&mut self, raw: u8) -> (Mode, Option<ModeChange>) {
        let mode = Mode::from_raw(raw);
        (mode, self.observe_mode(mode))
    }

    /// Record an already decoded mode
    pub fn observe_mode(&mut self, mode: Mode) -> Option<ModeChange> {
        let previous = self.last.replace(mode);
        match previous {
            Some(old) if old != mode => Some(ModeChange { old, new: mode }),
            _ => None,
        }
    }
}
