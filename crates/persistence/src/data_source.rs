// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use dbfixture::{ConnectionName, ConnectionNaming, TestIdentity};

use crate::error::PersistenceError;
use crate::session::DatabaseSession;

/// A factory of sessions on the database belonging to the current test.
///
/// Every call on the same thread with the same identity reaches the same
/// database, so collaborating fixtures can each open their own session.
pub trait DataSource: Send + Sync {
    /// The name sessions from this source connect to.
    fn connection_name(&self, identity: Option<&TestIdentity>) -> ConnectionName;

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or
    /// initialized.
    fn connect(&self, identity: Option<&TestIdentity>) -> Result<DatabaseSession, PersistenceError>;
}

/// The default data source: thread-private shared-cache in-memory
/// databases named by [`ConnectionNaming`].
#[derive(Debug, Clone)]
pub struct InMemoryDataSource {
    naming: ConnectionNaming,
    foreign_keys: bool,
}

impl Default for InMemoryDataSource {
    fn default() -> Self {
        Self::new(ConnectionNaming::new())
    }
}

impl InMemoryDataSource {
    #[must_use]
    pub const fn new(naming: ConnectionNaming) -> Self {
        Self {
            naming,
            foreign_keys: true,
        }
    }

    /// Enables or disables `PRAGMA foreign_keys` on new connections.
    #[must_use]
    pub const fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub const fn naming(&self) -> &ConnectionNaming {
        &self.naming
    }

    #[must_use]
    pub const fn foreign_keys(&self) -> bool {
        self.foreign_keys
    }
}

impl DataSource for InMemoryDataSource {
    fn connection_name(&self, identity: Option<&TestIdentity>) -> ConnectionName {
        self.naming.derive(identity)
    }

    fn connect(&self, identity: Option<&TestIdentity>) -> Result<DatabaseSession, PersistenceError> {
        DatabaseSession::open(self.connection_name(identity), self.foreign_keys)
    }
}
