//! Core error types for focustime-core.
//!
//! Every failure in this crate degrades to "use defaults / keep last known
//! state" at the call site; these types exist so callers can tell which
//! boundary a failure came from.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focustime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Remote settings errors
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Local snapshot persistence errors
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Audio cue errors
    #[error("Cue error: {0}")]
    Cue(#[from] CueError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors talking to the remote settings store.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Transport failure (DNS, connect, timeout, reading the body)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Settings server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// No credentials for the current user
    #[error("Not authenticated with the settings service")]
    NotAuthenticated,

    /// The endpoint URL could not be built
    #[error("Invalid settings endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The server sent a record we could not interpret
    #[error("Malformed settings record: {0}")]
    Malformed(String),
}

/// Local snapshot persistence errors.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The persisted payload is not a valid snapshot
    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),

    /// The backing slot failed to read or write
    #[error("Snapshot slot failed: {0}")]
    Slot(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// The data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Duration fields must be positive whole minutes
    #[error("Invalid value for '{field}': {value} (must be a positive number of minutes)")]
    NonPositiveMinutes { field: &'static str, value: i64 },

    /// Duration exceeds the supported range
    #[error("Invalid value for '{field}': {value} exceeds {max} minutes")]
    TooLarge {
        field: &'static str,
        value: i64,
        max: u32,
    },
}

/// Audio cue playback errors. Always swallowed by the notifier.
#[derive(Error, Debug)]
pub enum CueError {
    /// The player process could not be spawned
    #[error("Failed to launch cue player '{player}': {source}")]
    Launch {
        player: String,
        #[source]
        source: std::io::Error,
    },

    /// No sound file configured or found
    #[error("Cue sound not found: {0}")]
    MissingSound(PathBuf),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<DatabaseError> for SnapshotError {
    fn from(err: DatabaseError) -> Self {
        SnapshotError::Slot(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
