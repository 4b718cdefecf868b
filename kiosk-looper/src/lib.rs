//! # Kiosk Looper Library (kiosk-looper)
//!
//! Position/mode driven playlist scheduler for an unattended looping video kiosk.
//!
//! **Purpose:** Track the rotary selector and mode switch (locally or over a
//! serial line), keep exactly one content item playing from the playlist of
//! the current (position, mode), and bridge content sets with transition clips.
//!
//! **Architecture:** Input trackers write into one mutex-guarded snapshot;
//! a single-threaded poll loop reads that snapshot once per tick and drives
//! the scheduler, which talks to a `Player` adapter.

pub mod content;
pub mod error;
pub mod input;
pub mod persist;
pub mod player;
pub mod runner;
pub mod scheduler;
pub mod serial;

pub use error::{Error, Result};
pub use input::SharedInputs;
pub use scheduler::Scheduler;
