//! Persisted position state
//!
//! The last known position and accumulator survive restarts through a small
//! JSON file. Nothing here may stop the kiosk: a broken file loads as
//! defaults and a failed write is only logged.

use kiosk_common::Position;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable record of where the selector was left
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub position: Position,
    pub accumulator: i64,
}

/// File-backed store for [`PersistedState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored state, falling back to `{0, 0}` on any failure
    pub fn load(&self) -> PersistedState {
        match self.try_load() {
            Ok(state) => {
                debug!(
                    "Loaded persisted state from {}: position={}, accumulator={}",
                    self.path.display(),
                    state.position,
                    state.accumulator
                );
                state
            }
            Err(e) => {
                warn!(
                    "Using default state, cannot load {}: {}",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    fn try_load(&self) -> kiosk_common::Result<PersistedState> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the state; failures are logged and otherwise ignored
    pub fn save(&self, state: &PersistedState) {
        if let Err(e) = self.try_save(state) {
            warn!("Failed to persist state to {}: {}", self.path.display(), e);
        }
    }

    /// Write to `<path>.tmp` and rename over the target so a crash mid-write
    /// never leaves a truncated file behind
    fn try_save(&self, state: &PersistedState) -> kiosk_common::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let json = serde_json::to_vec(state)?;
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), PersistedState::default());
    }

    #[test]
    fn test_corrupt_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(StateStore::new(&path).load(), PersistedState::default());
    }

    #[test]
    fn test_save_then_load_returns_state() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));
        let state = PersistedState {
            position: Position::new(2),
            accumulator: -3,
        };
        store.save(&state);
        assert_eq!(store.load(), state);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn test_save_of_load_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(&path);
        store.save(&PersistedState {
            position: Position::new(1),
            accumulator: 4,
        });
        let before = std::fs::read(&path).unwrap();

        store.save(&store.load());

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_extra_and_missing_fields_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"position": 3, "rotary": {"gpio": 7}}"#).unwrap();
        let state = StateStore::new(&path).load();
        assert_eq!(state.position, Position::new(3));
        assert_eq!(state.accumulator, 0);
    }

    #[test]
    fn test_unwritable_path_does_not_panic() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail
        let path = dir.path().join("state.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        StateStore::new(&path).save(&PersistedState::default());
    }
}
