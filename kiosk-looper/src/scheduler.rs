//! Playlist scheduler
//!
//! The state machine deciding what plays next. Once per tick it:
//! 1. compares the input snapshot with the previous tick's (position, mode)
//! 2. on a change, drops queued content of the old set and pushes the matching
//!    transition clip (if one exists) to the front of the queue
//! 3. tops the queue up with the active playlist while it holds one item or less
//! 4. hands the front item to the player when the player is free
//!
//! A mode flip wins over a position change detected in the same tick, so two
//! transition clips never fire back to back.

use crate::content::ContentLibrary;
use crate::input::InputSnapshot;
use crate::player::Player;
use kiosk_common::events::{EventBus, KioskEvent, SchedulerState};
use kiosk_common::{Mode, Position};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry of the play queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    /// Regular playlist content
    Content(PathBuf),
    /// One-shot clip bridging two content sets
    Transition(PathBuf),
}

impl QueueItem {
    pub fn path(&self) -> &Path {
        match self {
            QueueItem::Content(path) | QueueItem::Transition(path) => path,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, QueueItem::Transition(_))
    }
}

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Transition clip pushed to the queue front this tick
    pub transition: Option<PathBuf>,
    /// Items appended by the refill step
    pub refilled: usize,
    /// Item handed to the player this tick
    pub started: Option<QueueItem>,
}

/// Owns the play queue and drives the player
pub struct Scheduler {
    library: Arc<ContentLibrary>,
    queue: VecDeque<QueueItem>,
    state: SchedulerState,
    position: Position,
    mode: Mode,
    events: EventBus,
}

impl Scheduler {
    /// Start in `Idle` at the given inputs; the first tick fills the queue
    pub fn new(library: Arc<ContentLibrary>, initial: InputSnapshot, events: EventBus) -> Self {
        info!(
            "Scheduler starting at position {} ({})",
            initial.position, initial.mode
        );
        Self {
            library,
            queue: VecDeque::new(),
            state: SchedulerState::Idle,
            position: initial.position,
            mode: initial.mode,
            events,
        }
    }

    /// Shared handle to the static content the scheduler consults
    pub fn library(&self) -> Arc<ContentLibrary> {
        Arc::clone(&self.library)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn queue(&self) -> impl Iterator<Item = &QueueItem> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// (position, mode) the queue currently serves
    pub fn active(&self) -> (Position, Mode) {
        (self.position, self.mode)
    }

    /// Run one scheduling step
    pub fn tick(&mut self, snapshot: InputSnapshot, player: &mut dyn Player) -> TickOutcome {
        let mut outcome = TickOutcome {
            transition: self.apply_input_change(snapshot),
            ..TickOutcome::default()
        };

        outcome.refilled = self.refill();

        let busy = if player.is_playing() {
            true
        } else {
            match self.queue.pop_front() {
                Some(item) => {
                    let started = self.start(item.clone(), player);
                    if started {
                        outcome.started = Some(item);
                    }
                    started
                }
                None => false,
            }
        };

        let next = match self.queue.front() {
            Some(item) if item.is_transition() => SchedulerState::TransitionPending,
            Some(_) => SchedulerState::Playing,
            None if busy => SchedulerState::Playing,
            None => SchedulerState::Idle,
        };
        self.set_state(next);

        outcome
    }

    /// Stop playback and forget queued items
    pub fn shutdown(&mut self, player: &mut dyn Player) {
        info!("Scheduler shutting down with {} queued items", self.queue.len());
        player.stop();
        self.queue.clear();
        self.set_state(SchedulerState::Idle);
    }

    fn apply_input_change(&mut self, snapshot: InputSnapshot) -> Option<PathBuf> {
        let position_changed = snapshot.position != self.position;
        let mode_changed = snapshot.mode != self.mode;
        if !position_changed && !mode_changed {
            return None;
        }

        let transitions = &self.library.transitions;
        let clip = if mode_changed {
            if position_changed {
                debug!(
                    "Position {} -> {} superseded by mode flip",
                    self.position, snapshot.position
                );
            }
            transitions.mode_flip(snapshot.position, self.mode, snapshot.mode)
        } else {
            transitions.position_move(self.mode, self.position, snapshot.position)
        }
        .map(Path::to_path_buf);

        // Anything still queued belongs to the set we are leaving
        let dropped = self.queue.len();
        self.queue.clear();
        debug!(
            "Inputs ({}, {}) -> ({}, {}), dropped {} queued items",
            self.position, self.mode, snapshot.position, snapshot.mode, dropped
        );

        self.position = snapshot.position;
        self.mode = snapshot.mode;

        match &clip {
            Some(path) => {
                info!("Queueing transition {}", path.display());
                self.queue.push_front(QueueItem::Transition(path.clone()));
                self.events.emit_lossy(KioskEvent::TransitionQueued {
                    item: path.clone(),
                    timestamp: chrono::Utc::now(),
                });
            }
            None => debug!("No transition clip for this change"),
        }
        clip
    }

    /// Append the active playlist until the queue holds more than one item
    fn refill(&mut self) -> usize {
        let playlist = self.library.playlists.get(self.position, self.mode);
        if playlist.is_empty() {
            return 0;
        }

        let mut added = 0;
        while self.queue.len() <= 1 {
            self.queue
                .extend(playlist.iter().cloned().map(QueueItem::Content));
            added += playlist.len();
        }
        if added == 0 {
            return 0;
        }

        debug!(
            "Refilled queue with {} items for position {} ({})",
            added, self.position, self.mode
        );
        self.events.emit_lossy(KioskEvent::QueueRefilled {
            position: self.position,
            mode: self.mode,
            added,
            timestamp: chrono::Utc::now(),
        });
        added
    }

    fn start(&mut self, item: QueueItem, player: &mut dyn Player) -> bool {
        match player.play(item.path()) {
            Ok(()) => {
                info!("Playing {}", item.path().display());
                self.events.emit_lossy(KioskEvent::ItemStarted {
                    item: item.path().to_path_buf(),
                    transition: item.is_transition(),
                    timestamp: chrono::Utc::now(),
                });
                true
            }
            Err(e) => {
                warn!("Skipping {}: {}", item.path().display(), e);
                false
            }
        }
    }

    fn set_state(&mut self, next: SchedulerState) {
        if next == self.state {
            return;
        }
        debug!("Scheduler {} -> {}", self.state, next);
        self.events.emit_lossy(KioskEvent::SchedulerStateChanged {
            old: self.state,
            new: next,
            timestamp: chrono::Utc::now(),
        });
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PlaylistSet, TransitionTable};
    use crate::error::{Error, Result};

    /// Player double: busy until `finish` is called, records every item
    #[derive(Default)]
    struct ManualPlayer {
        busy: bool,
        played: Vec<PathBuf>,
        fail: bool,
        stopped: bool,
    }

    impl ManualPlayer {
        fn finish(&mut self) {
            self.busy = false;
        }
    }

    impl Player for ManualPlayer {
        fn play(&mut self, item: &Path) -> Result<()> {
            if self.fail {
                return Err(Error::Player("missing".to_string()));
            }
            self.busy = true;
            self.played.push(item.to_path_buf());
            Ok(())
        }

        fn is_playing(&mut self) -> bool {
            self.busy
        }

        fn stop(&mut self) {
            self.busy = false;
            self.stopped = true;
        }
    }

    fn p(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    fn library() -> Arc<ContentLibrary> {
        let standard = (0..4)
            .map(|i| vec![p(&format!("std{}_a", i)), p(&format!("std{}_b", i))])
            .collect();
        let mut alternative: Vec<Vec<PathBuf>> = (0..4)
            .map(|i| vec![p(&format!("alt{}_a", i)), p(&format!("alt{}_b", i))])
            .collect();
        alternative[3] = Vec::new();
        let playlists = PlaylistSet::new(standard, alternative).unwrap();

        let mut transitions = TransitionTable::new();
        transitions.insert_position_move(Mode::Standard, Position::new(0), Position::new(1), p("std_1to2"));
        transitions.insert_mode_flip(Position::new(2), Mode::Standard, Mode::Alternative, p("std_to_alt3"));
        transitions.insert_mode_flip(Position::new(1), Mode::Standard, Mode::Alternative, p("std_to_alt2"));
        Arc::new(ContentLibrary::new(playlists, transitions))
    }

    fn snap(position: usize, mode: Mode) -> InputSnapshot {
        InputSnapshot {
            position: Position::new(position),
            mode,
            accumulator: 0,
        }
    }

    fn scheduler(position: usize, mode: Mode) -> Scheduler {
        Scheduler::new(library(), snap(position, mode), EventBus::new(64))
    }

    #[test]
    fn test_first_tick_fills_and_plays() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        assert_eq!(s.state(), SchedulerState::Idle);

        let outcome = s.tick(snap(0, Mode::Standard), &mut player);

        assert_eq!(outcome.transition, None);
        assert_eq!(outcome.refilled, 2);
        assert_eq!(outcome.started, Some(QueueItem::Content(p("std0_a"))));
        assert_eq!(player.played, vec![p("std0_a")]);
        assert_eq!(s.state(), SchedulerState::Playing);
    }

    #[test]
    fn test_playlist_loops_indefinitely() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        for _ in 0..6 {
            s.tick(snap(0, Mode::Standard), &mut player);
            player.finish();
        }
        assert_eq!(
            player.played,
            vec![p("std0_a"), p("std0_b"), p("std0_a"), p("std0_b"), p("std0_a"), p("std0_b")]
        );
    }

    #[test]
    fn test_no_new_item_while_playing() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(0, Mode::Standard), &mut player);
        for _ in 0..5 {
            assert_eq!(s.tick(snap(0, Mode::Standard), &mut player).started, None);
        }
        assert_eq!(player.played.len(), 1);
    }

    #[test]
    fn test_position_change_queues_transition_then_new_playlist() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(0, Mode::Standard), &mut player);

        let outcome = s.tick(snap(1, Mode::Standard), &mut player);
        assert_eq!(outcome.transition, Some(p("std_1to2")));
        assert_eq!(s.state(), SchedulerState::TransitionPending);

        player.finish();
        s.tick(snap(1, Mode::Standard), &mut player);
        player.finish();
        s.tick(snap(1, Mode::Standard), &mut player);

        assert_eq!(player.played, vec![p("std0_a"), p("std_1to2"), p("std1_a")]);
        assert_eq!(s.state(), SchedulerState::Playing);
    }

    #[test]
    fn test_transition_pushed_once_per_change() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(0, Mode::Standard), &mut player);

        s.tick(snap(1, Mode::Standard), &mut player);
        for _ in 0..10 {
            let outcome = s.tick(snap(1, Mode::Standard), &mut player);
            assert_eq!(outcome.transition, None);
        }
        let transitions = s.queue().filter(|item| item.is_transition()).count();
        assert_eq!(transitions, 1);
    }

    #[test]
    fn test_mode_flip_wins_over_position_change() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(0, Mode::Standard), &mut player);

        // std_1to2 exists, but the flip at the new position takes precedence
        let outcome = s.tick(snap(1, Mode::Alternative), &mut player);

        assert_eq!(outcome.transition, Some(p("std_to_alt2")));
        assert_eq!(s.queue().filter(|item| item.is_transition()).count(), 1);
        assert_eq!(s.active(), (Position::new(1), Mode::Alternative));
    }

    #[test]
    fn test_missing_transition_goes_straight_to_new_content() {
        let mut s = scheduler(1, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(1, Mode::Standard), &mut player);

        let outcome = s.tick(snap(3, Mode::Standard), &mut player);

        assert_eq!(outcome.transition, None);
        let queued: Vec<_> = s.queue().cloned().collect();
        assert_eq!(
            queued,
            vec![QueueItem::Content(p("std3_a")), QueueItem::Content(p("std3_b"))]
        );
    }

    #[test]
    fn test_refill_guarantee_with_single_item_playlist() {
        let standard = vec![vec![p("only")]];
        let alternative = vec![vec![p("alt")]];
        let library = Arc::new(ContentLibrary::new(
            PlaylistSet::new(standard, alternative).unwrap(),
            TransitionTable::new(),
        ));
        let mut s = Scheduler::new(library, snap(0, Mode::Standard), EventBus::new(8));
        let mut player = ManualPlayer::default();

        for _ in 0..4 {
            s.tick(snap(0, Mode::Standard), &mut player);
            assert!(s.queue_len() >= 1);
            player.finish();
        }
        assert_eq!(player.played.len(), 4);
    }

    #[test]
    fn test_empty_playlist_goes_idle_and_leaves_player_alone() {
        let mut s = scheduler(3, Mode::Alternative);
        let mut player = ManualPlayer::default();

        let outcome = s.tick(snap(3, Mode::Alternative), &mut player);

        assert_eq!(outcome.started, None);
        assert!(player.played.is_empty());
        assert!(!player.stopped);
        assert_eq!(s.state(), SchedulerState::Idle);

        // Content appears as soon as the inputs select a non-empty playlist
        s.tick(snap(3, Mode::Standard), &mut player);
        assert_eq!(s.state(), SchedulerState::Playing);
        assert_eq!(player.played, vec![p("std3_a")]);
    }

    #[test]
    fn test_failed_play_advances_next_tick() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer {
            fail: true,
            ..ManualPlayer::default()
        };
        let outcome = s.tick(snap(0, Mode::Standard), &mut player);
        assert_eq!(outcome.started, None);

        player.fail = false;
        s.tick(snap(0, Mode::Standard), &mut player);
        assert_eq!(player.played, vec![p("std0_b")]);
    }

    #[test]
    fn test_shutdown_stops_player() {
        let mut s = scheduler(0, Mode::Standard);
        let mut player = ManualPlayer::default();
        s.tick(snap(0, Mode::Standard), &mut player);

        s.shutdown(&mut player);

        assert!(player.stopped);
        assert_eq!(s.queue_len(), 0);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_state_changes_are_published() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let mut s = Scheduler::new(library(), snap(0, Mode::Standard), bus);
        let mut player = ManualPlayer::default();

        s.tick(snap(0, Mode::Standard), &mut player);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type());
        }
        assert_eq!(kinds, vec!["QueueRefilled", "ItemStarted", "SchedulerStateChanged"]);
    }
}
