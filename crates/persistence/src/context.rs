// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence context fixture.
//!
//! A [`PersistenceContext`] is the session a test body works through: one
//! connection with a unit-of-work boundary. The fixture opens it on
//! `before` and places it in every [`ContextSlot`] the test registered;
//! on `after` the slots are emptied and the context is closed, rolling back
//! any unit of work the test left open.

use std::sync::Arc;

use diesel::SqliteConnection;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use parking_lot::Mutex;
use tracing::{debug, warn};

use dbfixture::{Fixture, FixtureError, TestIdentity};

use crate::data_source::DataSource;
use crate::error::PersistenceError;
use crate::session::DatabaseSession;

/// A connection plus a unit-of-work boundary.
#[derive(Debug)]
pub struct PersistenceContext {
    session: DatabaseSession,
}

impl PersistenceContext {
    #[must_use]
    pub const fn new(session: DatabaseSession) -> Self {
        Self { session }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// The connection entities are read and written through.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` once the context is closed.
    pub fn connection(&mut self) -> Result<&mut SqliteConnection, PersistenceError> {
        self.session.connection_mut()
    }

    /// Starts a unit of work. Nested calls open savepoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is closed or `BEGIN` fails.
    pub fn begin(&mut self) -> Result<(), PersistenceError> {
        Ok(AnsiTransactionManager::begin_transaction(self.connection()?)?)
    }

    /// Commits the innermost unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is closed, no unit of work is
    /// active, or the commit fails.
    pub fn commit(&mut self) -> Result<(), PersistenceError> {
        Ok(AnsiTransactionManager::commit_transaction(self.connection()?)?)
    }

    /// Rolls back the innermost unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is closed, no unit of work is
    /// active, or the rollback fails.
    pub fn rollback(&mut self) -> Result<(), PersistenceError> {
        Ok(AnsiTransactionManager::rollback_transaction(self.connection()?)?)
    }

    /// Returns whether a unit of work is open, including one started
    /// directly on the connection with `Connection::transaction`.
    pub fn is_active(&mut self) -> bool {
        self.transaction_depth() > 0
    }

    fn transaction_depth(&mut self) -> u32 {
        let Ok(conn) = self.session.connection_mut() else {
            return 0;
        };
        AnsiTransactionManager::transaction_manager_status_mut(conn)
            .transaction_depth()
            .ok()
            .flatten()
            .map_or(0, std::num::NonZeroU32::get)
    }

    /// Rolls back every open unit of work and closes the connection.
    /// Closing twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns the rollback failure, if any. The connection is closed
    /// regardless.
    pub fn close(&mut self) -> Result<(), PersistenceError> {
        let mut result = Ok(());
        while self.is_active() {
            if let Err(e) = self.rollback() {
                result = Err(e);
                break;
            }
        }
        self.session.close();
        result
    }
}

type SharedContext = Arc<Mutex<PersistenceContext>>;

/// A place a test reads its persistence context from.
///
/// Clones refer to the same slot. The slot is filled between the context
/// fixture's `before` and `after` and empty otherwise.
#[derive(Debug, Clone, Default)]
pub struct ContextSlot {
    inner: Arc<Mutex<Option<SharedContext>>>,
}

impl ContextSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_injected(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Runs `f` with the injected context.
    ///
    /// # Errors
    ///
    /// Returns `ContextNotInjected` if the slot is empty.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut PersistenceContext) -> T,
    ) -> Result<T, PersistenceError> {
        let context = self
            .inner
            .lock()
            .clone()
            .ok_or(PersistenceError::ContextNotInjected)?;
        let mut guard = context.lock();
        Ok(f(&mut guard))
    }

    fn inject(&self, context: &SharedContext) {
        *self.inner.lock() = Some(Arc::clone(context));
    }

    fn clear(&self) {
        *self.inner.lock() = None;
    }
}

pub struct PersistenceContextFixture {
    source: Arc<dyn DataSource>,
    slots: Vec<ContextSlot>,
    current: Option<SharedContext>,
}

impl PersistenceContextFixture {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            slots: Vec::new(),
            current: None,
        }
    }

    /// Registers a slot to receive the context.
    #[must_use]
    pub fn inject_into(mut self, slot: &ContextSlot) -> Self {
        self.slots.push(slot.clone());
        self
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

impl Fixture for PersistenceContextFixture {
    fn name(&self) -> &str {
        "context"
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        let session = self.source.connect(Some(identity))?;
        let context = Arc::new(Mutex::new(PersistenceContext::new(session)));
        for slot in &self.slots {
            slot.inject(&context);
        }
        debug!(
            "Opened persistence context for {} ({} slots)",
            identity,
            self.slots.len()
        );
        self.current = Some(context);
        Ok(())
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        for slot in &self.slots {
            slot.clear();
        }
        let Some(context) = self.current.take() else {
            return Ok(());
        };

        let mut context = context.lock();
        if context.is_active() {
            warn!("Rolling back unit of work left open by {}", identity);
        }
        context.close()?;
        Ok(())
    }
}
