// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Schema migration fixture.
//!
//! Migrations are ordinary `diesel_migrations` sources, either embedded at
//! compile time with `embed_migrations!` or read from a directory at run
//! time. Diesel records applied versions in `__diesel_schema_migrations`,
//! so only pending migrations run. That table is part of the captured
//! archive, which means a restored database reports every migration as
//! applied and migrating it again is a no-op.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use diesel::SqliteConnection;
use diesel::migration::{Migration, MigrationSource};
use diesel::sqlite::Sqlite;
use diesel_migrations::{EmbeddedMigrations, FileBasedMigrations, MigrationHarness};
use tracing::{debug, info};

use dbfixture::{Fixture, FixtureError, TestIdentity};

use crate::config::FixtureConfig;
use crate::data_source::DataSource;
use crate::error::PersistenceError;

/// Directories picked up by [`MigrationFixture::with_default_locations`],
/// in the order they are applied.
pub const DEFAULT_LOCATIONS: [&str; 2] = ["migrations", "test_migrations"];

type BoxedSource = Box<dyn MigrationSource<Sqlite> + Send + Sync>;

/// A named set of migrations, optionally restricted to contexts.
pub struct Changelog {
    label: String,
    source: BoxedSource,
    contexts: Vec<String>,
}

impl Changelog {
    /// Wraps migrations embedded with `embed_migrations!`.
    #[must_use]
    pub fn embedded(label: impl Into<String>, migrations: EmbeddedMigrations) -> Self {
        Self {
            label: label.into(),
            source: Box::new(migrations),
            contexts: Vec::new(),
        }
    }

    /// Reads migrations from a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist or cannot be read.
    pub fn directory(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let source = FileBasedMigrations::from_path(path).map_err(|e| {
            PersistenceError::MigrationFailed(format!("{}: {e}", path.display()))
        })?;
        Ok(Self {
            label: path.display().to_string(),
            source: Box::new(source),
            contexts: Vec::new(),
        })
    }

    /// Restricts this changelog to the given contexts.
    #[must_use]
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn contexts(&self) -> &[String] {
        &self.contexts
    }

    /// An untagged changelog always runs; with no active contexts every
    /// changelog runs.
    fn is_active(&self, active: &[String]) -> bool {
        self.contexts.is_empty()
            || active.is_empty()
            || self.contexts.iter().any(|c| active.contains(c))
    }

    fn migrations(&self) -> Result<Vec<Box<dyn Migration<Sqlite>>>, PersistenceError> {
        let mut migrations = self
            .source
            .migrations()
            .map_err(|e| PersistenceError::MigrationFailed(format!("{}: {e}", self.label)))?;
        migrations.sort_by_key(|m| m.name().version().to_string());
        Ok(migrations)
    }
}

impl std::fmt::Debug for Changelog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Changelog")
            .field("label", &self.label)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}

/// Applies changelogs to the test database during `before`.
pub struct MigrationFixture {
    source: Arc<dyn DataSource>,
    changelogs: Vec<Changelog>,
    contexts: Vec<String>,
    enabled: bool,
    last_applied: Option<bool>,
}

impl MigrationFixture {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            changelogs: Vec::new(),
            contexts: Vec::new(),
            enabled: true,
            last_applied: None,
        }
    }

    #[must_use]
    pub fn with_changelog(mut self, changelog: Changelog) -> Self {
        self.changelogs.push(changelog);
        self
    }

    /// Adds each of [`DEFAULT_LOCATIONS`] under `base` that exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing directory cannot be read as a
    /// migrations directory.
    pub fn with_default_locations(mut self, base: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        for location in DEFAULT_LOCATIONS {
            let dir = base.as_ref().join(location);
            if dir.is_dir() {
                self.changelogs.push(Changelog::directory(&dir)?);
            } else {
                debug!("Skipping missing migration location {}", dir.display());
            }
        }
        Ok(self)
    }

    /// Sets the active contexts.
    #[must_use]
    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    /// Takes the `run_migrations` switch from `config`.
    #[must_use]
    pub const fn with_config(mut self, config: &FixtureConfig) -> Self {
        self.enabled = config.run_migrations;
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn changelogs(&self) -> &[Changelog] {
        &self.changelogs
    }

    /// Whether the most recent `before` applied any migration. `None` until
    /// `before` has run, or when migrations are disabled.
    #[must_use]
    pub const fn last_applied(&self) -> Option<bool> {
        self.last_applied
    }

    /// Identifies the schema these changelogs produce: every active
    /// migration's name in application order, plus the active contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if a changelog's migrations cannot be listed.
    pub fn fingerprint(&self) -> Result<String, PersistenceError> {
        let mut parts: Vec<String> = Vec::new();
        for changelog in self.changelogs.iter().filter(|c| c.is_active(&self.contexts)) {
            for migration in changelog.migrations()? {
                parts.push(migration.name().to_string());
            }
        }
        let mut fingerprint = parts.join(",");
        if !self.contexts.is_empty() {
            fingerprint.push('[');
            fingerprint.push_str(&self.contexts.join(","));
            fingerprint.push(']');
        }
        Ok(fingerprint)
    }

    /// Applies every pending migration of the active changelogs.
    ///
    /// Returns `true` if at least one migration ran.
    ///
    /// # Errors
    ///
    /// Returns `MigrationFailed` if listing, recording or running a
    /// migration fails. Migrations that ran before the failure stay
    /// applied.
    pub fn apply(&self, conn: &mut SqliteConnection) -> Result<bool, PersistenceError> {
        let applied: HashSet<String> = conn
            .applied_migrations()
            .map_err(|e| PersistenceError::MigrationFailed(e.to_string()))?
            .into_iter()
            .map(|v| v.to_string())
            .collect();

        let mut ran: usize = 0;
        for changelog in &self.changelogs {
            if !changelog.is_active(&self.contexts) {
                debug!("Skipping changelog {} (inactive contexts)", changelog.label);
                continue;
            }
            for migration in changelog.migrations()? {
                let version = migration.name().version().to_string();
                if applied.contains(&version) {
                    continue;
                }
                conn.run_migration(migration.as_ref()).map_err(|e| {
                    PersistenceError::MigrationFailed(format!("{}: {e}", migration.name()))
                })?;
                info!("Applied migration {}", migration.name());
                ran += 1;
            }
        }

        Ok(ran > 0)
    }
}

impl std::fmt::Debug for MigrationFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationFixture")
            .field("changelogs", &self.changelogs)
            .field("contexts", &self.contexts)
            .field("enabled", &self.enabled)
            .field("last_applied", &self.last_applied)
            .finish_non_exhaustive()
    }
}

impl Fixture for MigrationFixture {
    fn name(&self) -> &str {
        "migration"
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        if !self.enabled {
            debug!("Migrations disabled; skipping for {}", identity);
            self.last_applied = None;
            return Ok(());
        }

        let mut session = self.source.connect(Some(identity))?;
        session.validate()?;
        let result = self.apply(session.connection_mut()?);
        session.close();

        let applied = result?;
        self.last_applied = Some(applied);
        Ok(())
    }

    fn after(&mut self, _identity: &TestIdentity) -> Result<(), FixtureError> {
        Ok(())
    }
}
