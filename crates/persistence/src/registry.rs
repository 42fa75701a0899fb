// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::archive::Archive;
use crate::error::PersistenceError;
use crate::migration::MigrationFixture;

/// Hands out one shared [`Archive`] per schema.
///
/// Tests that migrate the same changelogs get the same archive and so
/// migrate once between them; tests with different schemas never see each
/// other's snapshot. Typically held in a `static` with `LazyLock`.
#[derive(Debug, Default)]
pub struct ArchiveRegistry {
    archives: RwLock<HashMap<String, Arc<Archive>>>,
}

impl ArchiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the archive stored under `key`, creating it if needed.
    #[must_use]
    pub fn archive_for(&self, key: &str) -> Arc<Archive> {
        if let Some(archive) = self.archives.read().get(key) {
            return Arc::clone(archive);
        }

        let mut archives = self.archives.write();
        Arc::clone(archives.entry(key.to_string()).or_insert_with(|| {
            debug!("Creating archive for schema {}", key);
            Arc::new(Archive::new())
        }))
    }

    /// Returns the archive for the schema `migration` produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the migrations cannot be listed.
    pub fn archive_for_migrations(
        &self,
        migration: &MigrationFixture,
    ) -> Result<Arc<Archive>, PersistenceError> {
        Ok(self.archive_for(&migration.fingerprint()?))
    }

    /// Forgets every archive. Archives already handed out are unaffected.
    pub fn clear(&self) {
        self.archives.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.archives.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.archives.read().is_empty()
    }
}
