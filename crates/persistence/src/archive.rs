// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Snapshot archive.
//!
//! An [`Archive`] holds at most one captured script. The first test to
//! finish with an empty archive captures its database; every later test
//! replays the script into its fresh in-memory instance instead of
//! migrating again.
//!
//! ## Locking
//!
//! - `save_if_empty` validates the session before taking the write lock,
//!   then re-checks emptiness under it, so concurrent first tests capture
//!   exactly once.
//! - `load_unless_empty` replays under the read lock, so any number of
//!   tests restore concurrently but never observe a capture in progress.

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::backend::sqlite;
use crate::error::PersistenceError;
use crate::session::DatabaseSession;

/// A thread-safe store for one captured database script.
#[derive(Debug, Default)]
pub struct Archive {
    data: RwLock<Option<String>>,
}

impl Archive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing (or an empty script) has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Self::holds_nothing(self.data.read().as_deref())
    }

    fn holds_nothing(data: Option<&str>) -> bool {
        data.is_none_or(str::is_empty)
    }

    /// Captures the session's database if nothing has been captured yet.
    ///
    /// Returns `true` if this call stored a script. On error the archive
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or invalid, or if
    /// capturing the script fails.
    pub fn save_if_empty(&self, session: &mut DatabaseSession) -> Result<bool, PersistenceError> {
        session.validate()?;

        if !self.is_empty() {
            return Ok(false);
        }

        let mut data = self.data.write();
        if !Self::holds_nothing(data.as_deref()) {
            debug!("Archive was filled concurrently; skipping capture");
            return Ok(false);
        }

        let script = sqlite::dump_script(session.connection_mut()?)?;
        info!(
            "Captured archive from {} ({} statements)",
            session.name(),
            script.lines().count()
        );
        *data = Some(script);
        drop(data);
        Ok(true)
    }

    /// Replays the captured script into the session's database.
    ///
    /// Returns `true` if a script was replayed, `false` if the archive is
    /// empty (in which case nothing is executed).
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or invalid, or if any
    /// statement of the script fails.
    pub fn load_unless_empty(
        &self,
        session: &mut DatabaseSession,
    ) -> Result<bool, PersistenceError> {
        session.validate()?;

        let data = self.data.read();
        let Some(script) = data.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(false);
        };

        sqlite::execute_script(session.connection_mut()?, script)?;
        debug!("Restored archive into {}", session.name());
        drop(data);
        Ok(true)
    }

    /// Returns a copy of the captured script, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<String> {
        self.data.read().clone()
    }
}
