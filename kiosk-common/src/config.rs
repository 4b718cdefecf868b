//! Configuration loading, validation and config file resolution
//!
//! The configuration is read once at startup and treated as an immutable value
//! afterwards. Only `[rotary]` and `[playlists]` are mandatory; every other
//! section falls back to defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable consulted when no `--config` argument is given
pub const CONFIG_ENV_VAR: &str = "KIOSK_CONFIG";

/// Complete kiosk configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KioskConfig {
    #[serde(default)]
    pub looper: LooperConfig,
    pub rotary: RotaryConfig,
    pub playlists: PlaylistsConfig,
    #[serde(default)]
    pub transitions: TransitionsConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduling loop and storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    /// Tick cadence of the scheduling loop in milliseconds
    pub poll_interval_ms: u64,
    /// Where the last known position is persisted
    pub state_path: PathBuf,
    /// Ordered content roots; relative paths resolve against these
    pub search_paths: Vec<PathBuf>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2,
            state_path: PathBuf::from("/var/lib/kiosk/state.json"),
            search_paths: vec![PathBuf::from("/media/usb0")],
        }
    }
}

/// Rotary selector settings
#[derive(Debug, Clone, Deserialize)]
pub struct RotaryConfig {
    /// Delta ticks needed to leave each position; its length is the position count
    pub boundaries: Vec<u32>,
}

/// Playlist file names, one per position for each mode
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistsConfig {
    pub standard: Vec<PathBuf>,
    pub alternative: Vec<PathBuf>,
}

/// Where transition clips live and which extension they carry
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitionsConfig {
    pub directory: PathBuf,
    pub extension: String,
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("videos"),
            extension: "h264".to_string(),
        }
    }
}

/// Serial bridge settings; the bridge is disabled without a device
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: Option<PathBuf>,
}

/// Which player adapter to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Process,
    Dummy,
}

/// Player adapter settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub kind: PlayerKind,
    /// External decoder command for the process player
    pub command: String,
    /// Arguments placed before the item path
    pub args: Vec<String>,
    /// How long the dummy player pretends each item plays
    pub dummy_duration_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            kind: PlayerKind::Process,
            command: "omxplayer".to_string(),
            args: vec!["--no-osd".to_string()],
            dummy_duration_ms: 3000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KioskConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: KioskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Number of discrete positions (`P`)
    pub fn position_count(&self) -> usize {
        self.rotary.boundaries.len()
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        let count = self.position_count();
        if count == 0 {
            return Err(Error::Config("rotary.boundaries must not be empty".to_string()));
        }
        if let Some(index) = self.rotary.boundaries.iter().position(|b| *b == 0) {
            return Err(Error::Config(format!(
                "rotary.boundaries[{}] must be positive",
                index
            )));
        }
        if self.playlists.standard.len() != count {
            return Err(Error::Config(format!(
                "playlists.standard has {} entries, expected {}",
                self.playlists.standard.len(),
                count
            )));
        }
        if self.playlists.alternative.len() != count {
            return Err(Error::Config(format!(
                "playlists.alternative has {} entries, expected {}",
                self.playlists.alternative.len(),
                count
            )));
        }
        if self.looper.poll_interval_ms == 0 {
            return Err(Error::Config("looper.poll_interval_ms must be positive".to_string()));
        }
        if self.looper.search_paths.is_empty() {
            return Err(Error::Config("looper.search_paths must not be empty".to_string()));
        }
        Ok(())
    }

    /// First search path, used as the base for relative content paths
    pub fn primary_search_path(&self) -> &Path {
        // validate() guarantees at least one entry
        self.looper
            .search_paths
            .first()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new("."))
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `KIOSK_CONFIG` environment variable
/// 3. `~/.config/kiosk/config.toml`
/// 4. `/etc/kiosk/config.toml`
/// 5. `/boot/kiosk.toml` (fallback, returned even when missing)
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("kiosk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return path;
        }
    }

    let system_config = PathBuf::from("/etc/kiosk/config.toml");
    if system_config.exists() {
        return system_config;
    }

    PathBuf::from("/boot/kiosk.toml")
}
