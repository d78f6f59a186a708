//! Core error types for synitheia-core.
//!
//! Storage and configuration failures bubble up as `CoreError` to the
//! controller layer. Domain refusals (missing record, unmet precondition)
//! are ordinary `Err` values the caller is expected to show to the user;
//! nothing in this crate panics on them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for synitheia-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Record absent, or owned by a different user.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The record exists but the requested transition is not allowed.
    #[error("{0}")]
    PreconditionUnmet(String),

    /// The environment refused a capability (notifications, exclusive display).
    #[error("{capability} unavailable: {reason}")]
    CapabilityDenied {
        capability: Capability,
        reason: String,
    },

    /// A previous storage failure has not been acknowledged yet.
    #[error("Operation halted after earlier failure: {0}")]
    Halted(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        CoreError::PreconditionUnmet(reason.into())
    }

    /// True for failures that come from the storage layer rather than from
    /// a refused domain operation.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Json(_)
        )
    }
}

/// Environment capabilities the core can run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Notifications,
    ExclusiveDisplay,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Notifications => write!(f, "notifications"),
            Capability::ExclusiveDisplay => write!(f, "exclusive display"),
        }
    }
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Connection mutex was poisoned by a panicking holder
    #[error("Database connection poisoned")]
    Poisoned,
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Empty required field
    #[error("'{0}' cannot be empty")]
    Empty(&'static str),

    /// Value out of its allowed range
    #[error("Value {value} out of range for '{field}' ({min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
