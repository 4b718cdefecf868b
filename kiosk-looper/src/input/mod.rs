//! Shared input state
//!
//! Position, accumulator and mode are written by two concurrent sources (the
//! local poll and the serial bridge) and read by the scheduler. Every write
//! and every read goes through one mutex, so a snapshot never mixes a position
//! and a mode from different moments.

pub mod mode;
pub mod position;

pub use mode::{ModeChange, ModeWatcher};
pub use position::{PositionChange, PositionTracker};

use crate::persist::{PersistedState, StateStore};
use kiosk_common::events::{EventBus, InputSource, KioskEvent};
use kiosk_common::{Mode, Position};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Consistent view of all inputs at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    pub position: Position,
    pub mode: Mode,
    pub accumulator: i64,
}

/// Source of local hardware readings, sampled once per tick
///
/// Decoding raw quadrature or GPIO levels happens behind this trait.
pub trait LocalInput: Send {
    /// Encoder ticks since the previous call
    fn read_delta(&mut self) -> i32;

    /// Raw mode switch level, `None` when no switch is wired
    fn read_switch(&mut self) -> Option<u8>;
}

/// Local input for kiosks driven only over the serial line
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocalInput;

impl LocalInput for NoLocalInput {
    fn read_delta(&mut self) -> i32 {
        0
    }

    fn read_switch(&mut self) -> Option<u8> {
        None
    }
}

struct InputState {
    tracker: PositionTracker,
    mode: ModeWatcher,
    /// Last level of the local switch, kept apart from the shared mode so an
    /// unchanged switch never overrides a serial report
    local_switch: ModeWatcher,
}

/// Mutex-guarded input state shared by every writer and the scheduler
#[derive(Clone)]
pub struct SharedInputs {
    inner: Arc<Mutex<InputState>>,
    store: Option<StateStore>,
    events: EventBus,
}

impl SharedInputs {
    /// Build the shared state from the tracker seed and an optional first mode reading
    pub fn new(
        tracker: PositionTracker,
        initial_mode: Option<Mode>,
        store: Option<StateStore>,
        events: EventBus,
    ) -> Self {
        let mode = match initial_mode {
            Some(mode) => ModeWatcher::with_initial(mode),
            None => ModeWatcher::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(InputState {
                tracker,
                mode,
                local_switch: ModeWatcher::new(),
            })),
            store,
            events,
        }
    }

    /// Read every input under one lock
    pub async fn snapshot(&self) -> InputSnapshot {
        let state = self.inner.lock().await;
        InputSnapshot {
            position: state.tracker.current_position(),
            mode: state.mode.current(),
            accumulator: state.tracker.accumulator(),
        }
    }

    /// Feed an encoder delta into the tracker
    pub async fn apply_delta(&self, delta: i32, source: InputSource) -> Option<PositionChange> {
        let mut state = self.inner.lock().await;
        let change = state.tracker.apply_delta(delta);
        if delta != 0 {
            debug!("Encoder delta {} from {}", delta, source);
        }
        self.after_position_write(&state, change, source);
        change
    }

    /// Set an absolute position
    pub async fn set_position(&self, position: Position, source: InputSource) -> Option<PositionChange> {
        let mut state = self.inner.lock().await;
        let change = state.tracker.set_position(position);
        self.after_position_write(&state, change, source);
        change
    }

    /// Feed a raw local switch level
    ///
    /// The shared mode follows the switch only when its level flips. The very
    /// first reading seeds the mode unless another source already set it.
    pub async fn observe_switch(&self, raw: u8, source: InputSource) -> Option<ModeChange> {
        let mut state = self.inner.lock().await;
        let first = !state.local_switch.has_reading();
        let (level, flipped) = state.local_switch.observe(raw);
        let change = match flipped {
            Some(flip) => state.mode.observe_mode(flip.new),
            None if first && !state.mode.has_reading() => state.mode.observe_mode(level),
            None => None,
        };
        self.after_mode_write(change, source);
        change
    }

    /// Set the mode directly
    pub async fn set_mode(&self, mode: Mode, source: InputSource) -> Option<ModeChange> {
        let mut state = self.inner.lock().await;
        let change = state.mode.observe_mode(mode);
        self.after_mode_write(change, source);
        change
    }

    /// Apply a position and optional mode as one atomic update
    pub async fn apply_remote(
        &self,
        position: Position,
        mode: Option<Mode>,
        source: InputSource,
    ) -> (Option<PositionChange>, Option<ModeChange>) {
        let mut state = self.inner.lock().await;
        let position_change = state.tracker.set_position(position);
        self.after_position_write(&state, position_change, source);
        let mode_change = mode.and_then(|m| state.mode.observe_mode(m));
        self.after_mode_write(mode_change, source);
        (position_change, mode_change)
    }

    /// Sample a local input device once
    pub async fn sample_local(&self, input: &mut dyn LocalInput) {
        let delta = input.read_delta();
        if delta != 0 {
            self.apply_delta(delta, InputSource::Local).await;
        }
        if let Some(raw) = input.read_switch() {
            self.observe_switch(raw, InputSource::Local).await;
        }
    }

    fn after_position_write(
        &self,
        state: &InputState,
        change: Option<PositionChange>,
        source: InputSource,
    ) {
        let Some(change) = change else {
            return;
        };
        info!(
            "Position {} -> {} ({})",
            change.old, change.new, source
        );
        if let Some(store) = &self.store {
            store.save(&PersistedState {
                position: change.new,
                accumulator: state.tracker.accumulator(),
            });
        }
        self.events.emit_lossy(KioskEvent::PositionChanged {
            old: change.old,
            new: change.new,
            source,
            timestamp: chrono::Utc::now(),
        });
    }

    fn after_mode_write(&self, change: Option<ModeChange>, source: InputSource) {
        let Some(change) = change else {
            return;
        };
        info!("Mode {} -> {} ({})", change.old, change.new, source);
        self.events.emit_lossy(KioskEvent::ModeChanged {
            old: change.old,
            new: change.new,
            source,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn inputs(store: Option<StateStore>) -> (SharedInputs, EventBus) {
        let bus = EventBus::new(32);
        let tracker = PositionTracker::new(vec![5, 5, 5, 5], Position::new(0), 0);
        (SharedInputs::new(tracker, None, store, bus.clone()), bus)
    }

    struct ScriptedInput {
        deltas: Vec<i32>,
        switch: Option<u8>,
    }

    impl LocalInput for ScriptedInput {
        fn read_delta(&mut self) -> i32 {
            self.deltas.pop().unwrap_or(0)
        }

        fn read_switch(&mut self) -> Option<u8> {
            self.switch
        }
    }

    #[tokio::test]
    async fn test_position_change_is_persisted() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let (inputs, _bus) = inputs(Some(store.clone()));

        inputs.apply_delta(7, InputSource::Local).await;

        let saved = store.load();
        assert_eq!(saved.position, Position::new(1));
        assert_eq!(saved.accumulator, 2);
    }

    #[tokio::test]
    async fn test_no_save_without_position_change() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let (inputs, _bus) = inputs(Some(store.clone()));

        inputs.apply_delta(3, InputSource::Local).await;

        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_events_emitted_for_changes() {
        let (inputs, bus) = inputs(None);
        let mut rx = bus.subscribe();

        inputs.set_position(Position::new(2), InputSource::Serial).await;
        inputs.set_mode(Mode::Standard, InputSource::Serial).await;
        inputs.set_mode(Mode::Alternative, InputSource::Serial).await;

        assert_eq!(rx.recv().await.unwrap().event_type(), "PositionChanged");
        // First mode reading is silent; the flip is reported
        assert_eq!(rx.recv().await.unwrap().event_type(), "ModeChanged");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_apply_remote_updates_both_fields() {
        let (inputs, _bus) = inputs(None);
        inputs.apply_delta(3, InputSource::Local).await;

        let (pos, mode) = inputs
            .apply_remote(Position::new(2), Some(Mode::Alternative), InputSource::Serial)
            .await;

        assert!(pos.is_some());
        assert!(mode.is_none());
        let snap = inputs.snapshot().await;
        assert_eq!(snap.position, Position::new(2));
        assert_eq!(snap.mode, Mode::Alternative);
        assert_eq!(snap.accumulator, 0);
    }

    #[tokio::test]
    async fn test_sample_local_reads_both_inputs() {
        let (inputs, _bus) = inputs(None);
        let mut device = ScriptedInput {
            deltas: vec![5],
            switch: Some(1),
        };

        inputs.sample_local(&mut device).await;

        let snap = inputs.snapshot().await;
        assert_eq!(snap.position, Position::new(1));
        assert_eq!(snap.mode, Mode::Alternative);
    }

    #[tokio::test]
    async fn test_unchanged_switch_keeps_serial_mode() {
        let (inputs, bus) = inputs(None);
        let mut rx = bus.subscribe();
        let mut device = ScriptedInput {
            deltas: Vec::new(),
            switch: Some(0),
        };

        inputs.sample_local(&mut device).await;
        inputs
            .apply_remote(Position::new(0), Some(Mode::Alternative), InputSource::Serial)
            .await;
        inputs.sample_local(&mut device).await;
        assert_eq!(inputs.snapshot().await.mode, Mode::Alternative);

        // A real flip of the switch still wins
        device.switch = Some(1);
        inputs.sample_local(&mut device).await;
        device.switch = Some(0);
        inputs.sample_local(&mut device).await;
        assert_eq!(inputs.snapshot().await.mode, Mode::Standard);

        let mut mode_changes = 0;
        while let Ok(event) = rx.try_recv() {
            if event.event_type() == "ModeChanged" {
                mode_changes += 1;
            }
        }
        assert_eq!(mode_changes, 2);
    }

    #[tokio::test]
    async fn test_repeated_serial_position_keeps_encoder_ticks() {
        let (inputs, _bus) = inputs(None);
        inputs.set_position(Position::new(1), InputSource::Serial).await;

        inputs.apply_delta(4, InputSource::Local).await;
        let (pos, _) = inputs
            .apply_remote(Position::new(1), None, InputSource::Serial)
            .await;
        assert!(pos.is_none());
        inputs.apply_delta(1, InputSource::Local).await;

        let snap = inputs.snapshot().await;
        assert_eq!(snap.position, Position::new(2));
        assert_eq!(snap.accumulator, 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers_keep_invariants() {
        let (inputs, _bus) = inputs(None);
        let mut handles = Vec::new();
        for i in 0..8 {
            let inputs = inputs.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let delta = if i % 2 == 0 { 3 } else { -2 };
                    inputs.apply_delta(delta, InputSource::Local).await;
                    inputs.set_mode(Mode::from_raw((i % 2) as u8), InputSource::Serial).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snap = inputs.snapshot().await;
        assert!(snap.position.index() < 4);
        assert!(snap.accumulator.abs() < 5);
    }
}
