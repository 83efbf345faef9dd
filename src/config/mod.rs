//! Saver configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults, environment variable names, reserved columns)
//! - The per-engine `SaverConfig`
//! - CLI option types and parsing for the loader binary

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{LogFormat, LogLevel, Opt, SaverConfig, TimerFailurePolicy};
