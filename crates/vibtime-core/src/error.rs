//! Core error types for vibtime-core.
//!
//! Detection failures are expected, recoverable conditions: they are returned
//! as values and mirrored to observers as `Event::Error`, never panics.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for vibtime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Sensor / watch-mode start failures
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Key-value persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a detection session could not start.
///
/// Every variant leaves the detector untouched, so the caller may retry once
/// the blocking condition clears.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// No accelerometer is present on the device
    #[error("Accelerometer not available")]
    SensorUnavailable,

    /// A session is already listening
    #[error("Watch mode is already active")]
    AlreadyActive,

    /// The last fired vibration is still inside the cooldown window
    #[error("Still in cooldown period: {remaining_ms} ms remaining")]
    InCooldown { remaining_ms: u64 },

    /// The sensor refused the listener
    #[error("Failed to register sensor listener: {0}")]
    RegistrationFailed(String),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StorageError {
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

    /// Stored value does not parse as the requested type
    #[error("Value for '{key}' is not a valid {expected}: {value}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        value: String,
    },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key not present in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Hour outside 0-23 or minute outside 0-59
    #[error("Invalid time {hour}:{minute:02}: hour must be 0-23 and minute 0-59")]
    TimeOutOfRange { hour: u32, minute: u32 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
