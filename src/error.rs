//! Error types.
//!
//! Each concern gets its own enum so callers can match on exactly the
//! failures an operation can produce.

use thiserror::Error;

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("max_players_per_room must be at least 1")]
    ZeroMaxPlayers,

    #[error("missing player prefab reference")]
    MissingPlayerPrefab,
}

/// Failures reported by the session layer when a request cannot be issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not connected to the session service")]
    NotConnected,

    #[error("not in a room")]
    NotInRoom,

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Race lifecycle guard refusals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("only the master client may write room property {key}")]
    NotMaster { key: &'static str },

    #[error("room property {key} is already set")]
    AlreadySet { key: &'static str },

    #[error("laps can only be recorded while racing")]
    NotRacing,

    #[error("lap time must be a positive finite number")]
    InvalidLapTime,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Race result upload failure. Logged by the upload worker, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("upload rejected by server: {0}")]
    Rejected(String),

    #[error("upload transport failure: {0}")]
    Transport(String),
}
