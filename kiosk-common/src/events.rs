//! Event types for the kiosk event system
//!
//! Provides the shared event definitions and the EventBus used to publish
//! input changes and scheduler decisions.

use crate::types::{Mode, Position};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Which input produced a position or mode update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    /// Rotary encoder / switch wired to the kiosk itself
    Local,
    /// Microcontroller on the serial line
    Serial,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Local => write!(f, "local"),
            InputSource::Serial => write!(f, "serial"),
        }
    }
}

/// Scheduler state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Nothing available for the current position/mode
    Idle,
    /// Queue has content and the player is busy
    Playing,
    /// A transition clip is queued ahead of new content but not started
    TransitionPending,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Playing => write!(f, "playing"),
            SchedulerState::TransitionPending => write!(f, "transition_pending"),
        }
    }
}

/// Kiosk event types
///
/// Events are broadcast via EventBus. The core never depends on anyone
/// listening, so every emission from the core is lossy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KioskEvent {
    /// Rotary position changed
    PositionChanged {
        old: Position,
        new: Position,
        source: InputSource,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Mode switch changed
    ModeChanged {
        old: Mode,
        new: Mode,
        source: InputSource,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A transition clip was pushed to the front of the play queue
    TransitionQueued {
        item: PathBuf,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The active playlist was appended to the play queue
    QueueRefilled {
        position: Position,
        mode: Mode,
        /// Number of items appended
        added: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An item was handed to the player
    ItemStarted {
        item: PathBuf,
        /// True when the item is a transition clip
        transition: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scheduler moved between states
    SchedulerStateChanged {
        old: SchedulerState,
        new: SchedulerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A serial line could not be decoded and was dropped
    SerialLineRejected {
        line: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl KioskEvent {
    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            KioskEvent::PositionChanged { .. } => "PositionChanged",
            KioskEvent::ModeChanged { .. } => "ModeChanged",
            KioskEvent::TransitionQueued { .. } => "TransitionQueued",
            KioskEvent::QueueRefilled { .. } => "QueueRefilled",
            KioskEvent::ItemStarted { .. } => "ItemStarted",
            KioskEvent::SchedulerStateChanged { .. } => "SchedulerStateChanged",
            KioskEvent::SerialLineRejected { .. } => "SerialLineRejected",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use kiosk_common::events::{EventBus, InputSource, KioskEvent};
/// use kiosk_common::Position;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(KioskEvent::PositionChanged {
///     old: Position::new(0),
///     new: Position::new(1),
///     source: InputSource::Local,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KioskEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KioskEvent) {
        let _ = self.tx.send(event);
    }
}
