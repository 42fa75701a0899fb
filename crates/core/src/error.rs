// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use thiserror::Error;

/// Errors raised by fixtures during setup or teardown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    /// A required collaborator or setting is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A connection is closed or failed its liveness check.
    #[error("Connection state error: {0}")]
    ConnectionState(String),

    /// Capturing or restoring database state failed.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Applying migrations failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Locating, parsing, loading or unloading a dataset failed.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// The lifecycle phase in which a chain failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Teardown,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// Failure of a [`FixtureChain`](crate::FixtureChain) run.
///
/// `error` is the reported cause: the setup failure if setup failed,
/// otherwise the first teardown failure. Every other teardown failure that
/// occurred is kept in `suppressed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Fixture {fixture} failed during {phase}: {error}")]
pub struct ChainError {
    pub phase: Phase,
    pub fixture: String,
    #[source]
    pub error: FixtureError,
    pub suppressed: Vec<FixtureError>,
}
