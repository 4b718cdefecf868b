//! Rotary position tracker
//!
//! Turns incremental encoder deltas into a discrete position using one
//! boundary per position, so some positions can need more rotation to leave
//! than others.

use kiosk_common::Position;

/// Position change produced by [`PositionTracker::apply_delta`] or a direct set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub old: Position,
    pub new: Position,
}

/// Accumulates encoder ticks and steps the position across boundaries
///
/// Invariants after every call:
/// - `position` lies in `[0, P-1]`
/// - `|accumulator| < boundaries[position]`
#[derive(Debug, Clone)]
pub struct PositionTracker {
    boundaries: Vec<u32>,
    position: Position,
    accumulator: i64,
}

impl PositionTracker {
    /// Create a tracker seeded from persisted values
    ///
    /// `boundaries` must be non-empty with positive entries (checked by
    /// config validation). Out-of-range seeds are clamped.
    pub fn new(boundaries: Vec<u32>, position: Position, accumulator: i64) -> Self {
        let mut tracker = Self {
            position: Position::clamped(position.index() as i64, boundaries.len()),
            boundaries,
            accumulator,
        };
        tracker.normalize();
        tracker
    }

    pub fn position_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Pure read of the current position
    pub fn current_position(&self) -> Position {
        self.position
    }

    pub fn accumulator(&self) -> i64 {
        self.accumulator
    }

    /// Boundary of the current position
    pub fn active_boundary(&self) -> i64 {
        self.boundary_at(self.position)
    }

    fn boundary_at(&self, position: Position) -> i64 {
        self.boundaries
            .get(position.index())
            .copied()
            .unwrap_or(1)
            .max(1) as i64
    }

    /// Add `delta` ticks; returns the change when the position moved
    pub fn apply_delta(&mut self, delta: i32) -> Option<PositionChange> {
        if delta == 0 {
            return None;
        }
        let old = self.position;
        self.accumulator += i64::from(delta);
        self.normalize();
        (self.position != old).then_some(PositionChange {
            old,
            new: self.position,
        })
    }

    /// Jump straight to `position` (serial source)
    ///
    /// The accumulator restarts at zero only when the position actually moves;
    /// repeating the current position leaves pending encoder ticks alone.
    pub fn set_position(&mut self, position: Position) -> Option<PositionChange> {
        let old = self.position;
        let new = Position::clamped(position.index() as i64, self.boundaries.len());
        if new == old {
            return None;
        }
        self.position = new;
        self.accumulator = 0;
        Some(PositionChange { old, new })
    }

    /// Step across every boundary the accumulator has reached.
    ///
    /// Each crossing moves exactly one position and keeps the remainder.
    /// At either end the excess is dropped instead of banked.
    fn normalize(&mut self) {
        let last = self.boundaries.len().saturating_sub(1);
        loop {
            let boundary = self.active_boundary();
            if self.accumulator >= boundary {
                if self.position.index() >= last {
                    self.accumulator = 0;
                    break;
                }
                self.accumulator -= boundary;
                self.position = Position::new(self.position.index() + 1);
            } else if self.accumulator <= -boundary {
                if self.position.index() == 0 {
                    self.accumulator = 0;
                    break;
                }
                self.accumulator += boundary;
                self.position = Position::new(self.position.index() - 1);
            } else {
                break;
            }
        }
    }
}
