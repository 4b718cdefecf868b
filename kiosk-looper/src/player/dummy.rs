//! Stand-in player that pretends each item plays for a fixed time

use super::Player;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Player without a decoder, for bench setups and tests
#[derive(Debug)]
pub struct DummyPlayer {
    duration: Duration,
    playing_until: Option<Instant>,
    last_item: Option<PathBuf>,
}

impl DummyPlayer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            playing_until: None,
            last_item: None,
        }
    }

    /// Most recent item handed to `play`
    pub fn last_item(&self) -> Option<&Path> {
        self.last_item.as_deref()
    }
}

impl Player for DummyPlayer {
    fn play(&mut self, item: &Path) -> Result<()> {
        debug!("Dummy playback of {} for {:?}", item.display(), self.duration);
        self.playing_until = Some(Instant::now() + self.duration);
        self.last_item = Some(item.to_path_buf());
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        match self.playing_until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                self.playing_until = None;
                false
            }
            None => false,
        }
    }

    fn stop(&mut self) {
        self.playing_until = None;
    }
}
