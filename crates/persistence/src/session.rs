// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use diesel::SqliteConnection;
use tracing::debug;

use dbfixture::ConnectionName;

use crate::backend::sqlite;
use crate::error::PersistenceError;

/// An open connection to a named in-memory database.
///
/// Closing the session drops the physical connection. Any later use of
/// the session fails with [`PersistenceError::ConnectionClosed`].
pub struct DatabaseSession {
    name: ConnectionName,
    conn: Option<SqliteConnection>,
}

impl DatabaseSession {
    /// Opens a session on the named database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open(name: ConnectionName, foreign_keys: bool) -> Result<Self, PersistenceError> {
        let conn = sqlite::establish(&name, foreign_keys)?;
        Ok(Self {
            name,
            conn: Some(conn),
        })
    }

    #[must_use]
    pub const fn name(&self) -> &ConnectionName {
        &self.name
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns whether the session is open and answers a liveness probe.
    pub fn is_valid(&mut self) -> bool {
        self.validate().is_ok()
    }

    /// Checks that the session is open and usable.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the session was closed, or
    /// `InvalidConnection` if the liveness probe failed.
    pub fn validate(&mut self) -> Result<(), PersistenceError> {
        sqlite::check_alive(self.connection_mut()?)
    }

    /// Returns the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the session was closed.
    pub fn connection_mut(&mut self) -> Result<&mut SqliteConnection, PersistenceError> {
        let name = &self.name;
        self.conn
            .as_mut()
            .ok_or_else(|| PersistenceError::ConnectionClosed(name.to_string()))
    }

    /// Closes the session. Closing twice is harmless.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!("Closed connection to {}", self.name);
        }
    }
}

impl std::fmt::Debug for DatabaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSession")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}
