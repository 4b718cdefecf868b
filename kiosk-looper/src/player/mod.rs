//! Player adapters
//!
//! The scheduler only ever calls the three operations of [`Player`]; which
//! implementation runs is decided once at startup.

mod dummy;
mod process;

pub use dummy::DummyPlayer;
pub use process::ProcessPlayer;

use crate::error::Result;
use kiosk_common::config::{PlayerConfig, PlayerKind};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Capability surface used by the scheduler
///
/// `play` starts playback and returns immediately; completion is observed
/// later through `is_playing` turning false.
pub trait Player: Send {
    /// Start playing `item`. Errors mean the item could not be started.
    fn play(&mut self, item: &Path) -> Result<()>;

    /// True while an item is still playing
    fn is_playing(&mut self) -> bool;

    /// Stop whatever is playing
    fn stop(&mut self);
}

/// Build the configured player adapter
pub fn create_player(config: &PlayerConfig) -> Box<dyn Player> {
    match config.kind {
        PlayerKind::Process => {
            info!("Using process player: {} {:?}", config.command, config.args);
            Box::new(ProcessPlayer::new(config.command.clone(), config.args.clone()))
        }
        PlayerKind::Dummy => {
            info!("Using dummy player ({} ms per item)", config.dummy_duration_ms);
            Box::new(DummyPlayer::new(Duration::from_millis(config.dummy_duration_ms)))
        }
    }
}
