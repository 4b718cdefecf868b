//! Error types for kiosk-looper
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for kiosk-looper
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration that makes the looper unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Player adapter errors
    #[error("Player error: {0}")]
    Player(String),

    /// Serial transport errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Errors bubbled up from kiosk-common
    #[error(transparent)]
    Common(#[from] kiosk_common::Error),
}

/// Convenience Result type using kiosk-looper Error
pub type Result<T> = std::result::Result<T, Error>;
