// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Database lifecycle fixture.
//!
//! The outermost fixture of a database chain. It opens the thread-private
//! in-memory database for the test and keeps that connection open for the
//! whole test, so the database stays alive while collaborators connect
//! and disconnect.
//!
//! ```text
//! Uninitialized --before--> Connected  (archive empty; migrations will run)
//!               --before--> Restored   (archive replayed)
//! Connected | Restored --after--> TornDown
//! ```
//!
//! On `after`, the first test to finish with an empty archive captures its
//! database; the instance is then reset and the connection closed.

use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::{info, warn};

use dbfixture::{ConnectionName, Fixture, FixtureError, TestIdentity};

use crate::archive::Archive;
use crate::backend::sqlite;
use crate::config::FixtureConfig;
use crate::data_source::{DataSource, InMemoryDataSource};
use crate::error::PersistenceError;
use crate::session::DatabaseSession;

type ConfigureHook = Box<dyn Fn(&mut SqliteConnection) -> Result<(), PersistenceError> + Send>;

/// Lifecycle state of a [`DatabaseFixture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Connected,
    Restored,
    TornDown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Connected => write!(f, "connected"),
            Self::Restored => write!(f, "restored"),
            Self::TornDown => write!(f, "torn down"),
        }
    }
}

pub struct DatabaseFixture {
    source: Arc<dyn DataSource>,
    archive: Option<Arc<Archive>>,
    configure: Option<ConfigureHook>,
    session: Option<DatabaseSession>,
    state: LifecycleState,
}

impl Default for DatabaseFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseFixture {
    /// Creates a fixture on the default in-memory data source with a
    /// private archive.
    #[must_use]
    pub fn new() -> Self {
        Self::with_data_source(Arc::new(InMemoryDataSource::default()))
    }

    /// Creates a fixture on `source` with a private archive.
    #[must_use]
    pub fn with_data_source(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            archive: Some(Arc::new(Archive::new())),
            configure: None,
            session: None,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Creates a fixture whose data source follows `config`.
    #[must_use]
    pub fn from_config(config: &FixtureConfig) -> Self {
        Self::with_data_source(Arc::new(config.data_source()))
    }

    /// Shares `archive` with other fixtures, typically one obtained from an
    /// [`ArchiveRegistry`](crate::ArchiveRegistry).
    #[must_use]
    pub fn with_archive(mut self, archive: Arc<Archive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Disables capture and restore. Every test then starts from an empty
    /// database.
    #[must_use]
    pub fn without_archive(mut self) -> Self {
        self.archive = None;
        self
    }

    /// Runs `hook` on the lifecycle connection right after it is opened.
    #[must_use]
    pub fn with_configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut SqliteConnection) -> Result<(), PersistenceError> + Send + 'static,
    {
        self.configure = Some(Box::new(hook));
        self
    }

    /// A handle to the data source, for collaborating fixtures.
    #[must_use]
    pub fn data_source(&self) -> Arc<dyn DataSource> {
        Arc::clone(&self.source)
    }

    #[must_use]
    pub fn archive(&self) -> Option<Arc<Archive>> {
        self.archive.clone()
    }

    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// The name this fixture connects to for `identity`.
    #[must_use]
    pub fn connection_name(&self, identity: &TestIdentity) -> ConnectionName {
        self.source.connection_name(Some(identity))
    }

    /// The lifecycle session, while the fixture is between `before` and
    /// `after`.
    pub fn session_mut(&mut self) -> Option<&mut DatabaseSession> {
        self.session.as_mut()
    }

    fn open(&self, identity: &TestIdentity) -> Result<(DatabaseSession, bool), FixtureError> {
        let mut session = self.source.connect(Some(identity))?;

        if let Some(configure) = &self.configure {
            configure(session.connection_mut()?)?;
        }

        if !session.is_valid() {
            return Err(FixtureError::ConnectionState(format!(
                "connection to {} is not valid",
                session.name()
            )));
        }

        let restored = match &self.archive {
            Some(archive) => archive
                .load_unless_empty(&mut session)
                .map_err(|e| FixtureError::InvalidState(e.to_string()))?,
            None => false,
        };
        Ok((session, restored))
    }
}

impl Fixture for DatabaseFixture {
    fn name(&self) -> &str {
        "database"
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        let (session, restored) = self.open(identity)?;

        self.state = if restored {
            LifecycleState::Restored
        } else {
            LifecycleState::Connected
        };
        info!("Database {} {} for {}", session.name(), self.state, identity);
        self.session = Some(session);
        Ok(())
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        let Some(mut session) = self.session.take() else {
            self.state = LifecycleState::TornDown;
            return Ok(());
        };

        let capture_error: Option<FixtureError> = match &self.archive {
            Some(archive) if archive.is_empty() => archive
                .save_if_empty(&mut session)
                .err()
                .map(|e| FixtureError::InvalidState(e.to_string())),
            _ => None,
        };

        if let Err(e) = session.connection_mut().and_then(sqlite::reset_database) {
            warn!("Failed to reset {}: {}", session.name(), e);
        }
        session.close();

        self.state = LifecycleState::TornDown;
        info!("Database {} torn down for {}", session.name(), identity);

        capture_error.map_or(Ok(()), Err)
    }
}
