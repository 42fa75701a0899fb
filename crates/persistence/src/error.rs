// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use dbfixture::FixtureError;

/// Errors that can occur while operating on fixture databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// A database error occurred.
    DatabaseError(String),
    /// Database connection failed.
    DatabaseConnectionFailed(String),
    /// The session's connection has already been closed.
    ConnectionClosed(String),
    /// The connection failed its liveness check.
    InvalidConnection(String),
    /// Query execution failed.
    QueryFailed(String),
    /// Database migration failed.
    MigrationFailed(String),
    /// Capturing the database script failed.
    SnapshotFailed(String),
    /// Replaying a captured script failed.
    RestoreFailed(String),
    /// A dataset file could not be read.
    DatasetReadFailed(String),
    /// A dataset is malformed or could not be applied.
    DatasetInvalid(String),
    /// Serialization/deserialization error.
    SerializationError(String),
    /// A configuration value is malformed.
    ConfigurationError(String),
    /// No persistence context has been injected into the slot.
    ContextNotInjected,
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::DatabaseConnectionFailed(msg) => {
                write!(f, "Database connection failed: {msg}")
            }
            Self::ConnectionClosed(name) => write!(f, "Connection is closed: {name}"),
            Self::InvalidConnection(msg) => write!(f, "Connection is not valid: {msg}"),
            Self::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            Self::MigrationFailed(msg) => write!(f, "Migration failed: {msg}"),
            Self::SnapshotFailed(msg) => write!(f, "Snapshot capture failed: {msg}"),
            Self::RestoreFailed(msg) => write!(f, "Snapshot restore failed: {msg}"),
            Self::DatasetReadFailed(msg) => write!(f, "Dataset could not be read: {msg}"),
            Self::DatasetInvalid(msg) => write!(f, "Invalid dataset: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            Self::ContextNotInjected => write!(f, "No persistence context has been injected"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<diesel::result::Error> for PersistenceError {
    fn from(err: diesel::result::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<diesel::ConnectionError> for PersistenceError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::DatabaseConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::DatasetReadFailed(err.to_string())
    }
}

impl From<PersistenceError> for FixtureError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::DatabaseConnectionFailed(_)
            | PersistenceError::ConnectionClosed(_)
            | PersistenceError::InvalidConnection(_) => Self::ConnectionState(err.to_string()),
            PersistenceError::MigrationFailed(msg) => Self::Migration(msg),
            PersistenceError::SnapshotFailed(_)
            | PersistenceError::RestoreFailed(_)
            | PersistenceError::ContextNotInjected => Self::InvalidState(err.to_string()),
            PersistenceError::DatasetReadFailed(_) | PersistenceError::SerializationError(_) => {
                Self::Dataset(err.to_string())
            }
            PersistenceError::DatasetInvalid(msg) => Self::Dataset(msg),
            PersistenceError::ConfigurationError(msg) => Self::Configuration(msg),
            PersistenceError::DatabaseError(msg) => Self::Database(msg),
            PersistenceError::QueryFailed(_) => Self::Database(err.to_string()),
        }
    }
}
