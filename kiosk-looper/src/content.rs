//! Static content library: playlists per (position, mode) and transition clips
//!
//! Both tables are built once at startup and never mutated afterwards.

use crate::error::{Error, Result};
use kiosk_common::config::KioskConfig;
use kiosk_common::{Mode, Position};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ordered content items for every (position, mode) pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistSet {
    standard: Vec<Vec<PathBuf>>,
    alternative: Vec<Vec<PathBuf>>,
}

impl PlaylistSet {
    /// Both arrays must hold one playlist per position
    pub fn new(standard: Vec<Vec<PathBuf>>, alternative: Vec<Vec<PathBuf>>) -> Result<Self> {
        if standard.len() != alternative.len() {
            return Err(Error::Config(format!(
                "standard has {} playlists but alternative has {}",
                standard.len(),
                alternative.len()
            )));
        }
        Ok(Self {
            standard,
            alternative,
        })
    }

    pub fn position_count(&self) -> usize {
        self.standard.len()
    }

    /// Playlist for a pair; unknown positions read as empty
    pub fn get(&self, position: Position, mode: Mode) -> &[PathBuf] {
        let lists = match mode {
            Mode::Standard => &self.standard,
            Mode::Alternative => &self.alternative,
        };
        lists
            .get(position.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Transition clips keyed by the change they bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTable {
    position_moves: HashMap<(Mode, Position, Position), PathBuf>,
    mode_flips: HashMap<(Position, Mode, Mode), PathBuf>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip for a same-mode position change
    pub fn insert_position_move(&mut self, mode: Mode, from: Position, to: Position, item: PathBuf) {
        self.position_moves.insert((mode, from, to), item);
    }

    /// Clip for a mode flip at `position`
    pub fn insert_mode_flip(&mut self, position: Position, from: Mode, to: Mode, item: PathBuf) {
        self.mode_flips.insert((position, from, to), item);
    }

    pub fn position_move(&self, mode: Mode, from: Position, to: Position) -> Option<&Path> {
        self.position_moves
            .get(&(mode, from, to))
            .map(PathBuf::as_path)
    }

    pub fn mode_flip(&self, position: Position, from: Mode, to: Mode) -> Option<&Path> {
        self.mode_flips
            .get(&(position, from, to))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.position_moves.len() + self.mode_flips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the table from the file naming convention, keeping only clips that exist.
    ///
    /// - same-mode move: `<std|alt>_<from>to<to>.<ext>`
    /// - mode flip: `<std|alt>_to_<std|alt><pos>.<ext>`
    ///
    /// Positions in names are 1-based.
    pub fn from_directory(directory: &Path, extension: &str, position_count: usize) -> Self {
        let mut table = Self::new();
        let clip = |name: String| -> Option<PathBuf> {
            let path = directory.join(format!("{}.{}", name, extension));
            if path.is_file() {
                Some(path)
            } else {
                debug!("No transition clip {}", path.display());
                None
            }
        };

        for mode in Mode::ALL {
            for from in (0..position_count).map(Position::new) {
                for to in (0..position_count).map(Position::new) {
                    if from == to {
                        continue;
                    }
                    let name = format!("{}_{}to{}", mode.prefix(), from.number(), to.number());
                    if let Some(path) = clip(name) {
                        table.insert_position_move(mode, from, to, path);
                    }
                }
            }
        }

        for position in (0..position_count).map(Position::new) {
            for from in Mode::ALL {
                let to = from.other();
                let name = format!("{}_to_{}{}", from.prefix(), to.prefix(), position.number());
                if let Some(path) = clip(name) {
                    table.insert_mode_flip(position, from, to, path);
                }
            }
        }

        table
    }
}

/// Everything the scheduler consults, constructed once at startup
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    pub playlists: PlaylistSet,
    pub transitions: TransitionTable,
}

impl ContentLibrary {
    pub fn new(playlists: PlaylistSet, transitions: TransitionTable) -> Self {
        Self {
            playlists,
            transitions,
        }
    }

    /// Load playlist files and scan for transition clips as configured
    pub fn load(config: &KioskConfig) -> Result<Self> {
        let roots = &config.looper.search_paths;
        let base = config.primary_search_path();

        let load_all = |files: &[PathBuf]| -> Vec<Vec<PathBuf>> {
            files
                .iter()
                .map(|file| load_playlist_file(&base.join(file), roots))
                .collect()
        };
        let playlists = PlaylistSet::new(
            load_all(&config.playlists.standard),
            load_all(&config.playlists.alternative),
        )?;

        let transitions_dir = base.join(&config.transitions.directory);
        let transitions = TransitionTable::from_directory(
            &transitions_dir,
            &config.transitions.extension,
            config.position_count(),
        );

        info!(
            "Loaded {} playlists per mode and {} transition clips from {}",
            playlists.position_count(),
            transitions.len(),
            transitions_dir.display()
        );
        Ok(Self::new(playlists, transitions))
    }
}

/// Read a JSON array of item names; an unreadable file yields an empty playlist
pub fn load_playlist_file(path: &Path, roots: &[PathBuf]) -> Vec<PathBuf> {
    let names: Vec<String> = match std::fs::read_to_string(path)
        .map_err(kiosk_common::Error::from)
        .and_then(|text| serde_json::from_str(&text).map_err(kiosk_common::Error::from))
    {
        Ok(names) => names,
        Err(e) => {
            warn!("Playlist {} not loaded: {}", path.display(), e);
            return Vec::new();
        }
    };

    let items: Vec<PathBuf> = names
        .iter()
        .map(|name| resolve_item(Path::new(name), roots))
        .collect();
    debug!("Playlist {} has {} items", path.display(), items.len());
    items
}

/// Resolve a relative item against the first root that holds it, else the first root
pub fn resolve_item(item: &Path, roots: &[PathBuf]) -> PathBuf {
    if item.is_absolute() {
        return item.to_path_buf();
    }
    roots
        .iter()
        .map(|root| root.join(item))
        .find(|candidate| candidate.exists())
        .or_else(|| roots.first().map(|root| root.join(item)))
        .unwrap_or_else(|| item.to_path_buf())
}
