//! # Kiosk Common Library
//!
//! Shared code for the kiosk binaries including:
//! - Position and mode value types
//! - Event types (KioskEvent enum) and the EventBus
//! - Configuration loading and validation
//! - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use types::{Mode, Position};
