//! Error types for the timer engine

use thiserror::Error;

use crate::state::SessionStatus;

/// Errors reported to callers of the engine's control operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Requested duration falls outside the configured range
    #[error("duration of {minutes} minutes is outside the allowed range {min}-{max}")]
    InvalidDuration { minutes: u64, min: u64, max: u64 },

    /// A session is already running, paused or waiting for acknowledgement
    #[error("cannot start a new session while the current one is {0}")]
    SessionInProgress(SessionStatus),

    /// The control loop is no longer running
    #[error("timer engine is not running")]
    EngineStopped,
}

/// Rejected engine settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("minimum session length must be at least 1 minute")]
    ZeroMinimum,

    #[error("minimum session length {min} exceeds maximum {max}")]
    InvertedRange { min: u64, max: u64 },

    #[error("maximum session length of {0} minutes is too large")]
    MaximumTooLarge(u64),
}

/// Errors raised by persistent state stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
