//! Error types for flightwatch.
//!
//! This module defines all error types used throughout the flightwatch crate.
//! Most of them are recovered locally by the reconciliation loop; none of them
//! is allowed to stop the scheduler.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for flightwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The exclusive lock on the store could not be taken.
    #[error("failed to lock store at {path}: {source}")]
    StoreLock {
        /// Path to the lock file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Source Errors ===
    /// The request to a position source could not be completed.
    #[error("request to source '{source_name}' failed: {message}")]
    SourceRequest {
        /// Name of the position source.
        source_name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A position source answered with a non-success status.
    #[error("source '{source_name}' answered with status {status}")]
    SourceStatus {
        /// Name of the position source.
        source_name: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// A position source payload could not be decoded.
    #[error("malformed payload from source '{source_name}': {message}")]
    SourceDecode {
        /// Name of the position source.
        source_name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Notification Errors ===
    /// A notification could not be delivered.
    #[error("notification delivery failed: {0}")]
    Notify(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flightwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new notification error.
    #[must_use]
    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify(message.into())
    }

    /// Create a source request error.
    #[must_use]
    pub fn source_request(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::SourceRequest {
            source_name,
            message: message.into(),
        }
    }

    /// Create a source decode error.
    #[must_use]
    pub fn source_decode(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::SourceDecode {
            source_name,
            message: message.into(),
        }
    }

    /// Build the matching source error from a `reqwest` failure.
    ///
    /// Status errors keep their code, body decoding errors become
    /// [`Error::SourceDecode`], everything else is a transport failure.
    #[must_use]
    pub fn from_reqwest(source_name: &'static str, err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::SourceStatus {
                source_name,
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Self::source_decode(source_name, err.to_string())
        } else {
            Self::source_request(source_name, err.to_string())
        }
    }

    /// Check if this error came from a position source.
    #[must_use]
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::SourceRequest { .. } | Self::SourceStatus { .. } | Self::SourceDecode { .. }
        )
    }
}
