// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `SQLite` fixtures for `dbfixture`.
//!
//! Every test thread gets a private, named, shared-cache in-memory
//! database. Migrations run once per schema; the migrated (and seeded)
//! database is captured as a SQL script in an [`Archive`] and replayed into
//! every later test's fresh database.
//!
//! ## Fixtures
//!
//! Chained in this order by [`standard_chain`]:
//!
//! 1. [`DatabaseFixture`]: opens the test database, restores the archive,
//!    captures it on first teardown, then resets and closes the database
//! 2. [`MigrationFixture`]: applies pending `diesel_migrations`
//! 3. [`DatasetFixture`]: loads the test's JSON dataset, removes it after
//! 4. [`PersistenceContextFixture`]: hands the test body a connection
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dbfixture::test_identity;
//! use dbfixture_persistence::{
//!     Changelog, ContextSlot, DatabaseFixture, DatasetFixture, MigrationFixture,
//!     PersistenceContextFixture, standard_chain,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let database = DatabaseFixture::new();
//! let source = database.data_source();
//! let migration = MigrationFixture::new(Arc::clone(&source))
//!     .with_changelog(Changelog::directory("migrations")?);
//! let slot = ContextSlot::new();
//!
//! let mut chain = standard_chain(
//!     database,
//!     migration,
//!     DatasetFixture::new(Arc::clone(&source)),
//!     PersistenceContextFixture::new(source).inject_into(&slot),
//! );
//! chain.run(&test_identity!("creates_message"), || {
//!     slot.with(|ctx| ctx.is_open()).unwrap_or(false)
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Database names are derived from the calling thread, so a chain must run
//! on one thread from `before` to `after`. Archives may be shared freely
//! between threads.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod archive;
pub mod backend;
pub mod config;
mod context;
mod data_source;
mod database;
mod dataset;
mod error;
mod migration;
mod registry;
mod session;

#[cfg(test)]
mod tests;

use dbfixture::{Fixture, FixtureChain};

pub use archive::Archive;
pub use config::FixtureConfig;
pub use context::{ContextSlot, PersistenceContext, PersistenceContextFixture};
pub use data_source::{DataSource, InMemoryDataSource};
pub use database::{DatabaseFixture, LifecycleState};
pub use dataset::{
    Dataset, DatasetFixture, DatasetLocator, DatasetRow, DatasetTable, DirectoryDatasetLocator,
};
pub use error::PersistenceError;
pub use migration::{Changelog, DEFAULT_LOCATIONS, MigrationFixture};
pub use registry::ArchiveRegistry;
pub use session::DatabaseSession;

/// Chains the four fixtures in their required nesting order.
#[must_use]
pub fn standard_chain(
    database: impl Fixture + 'static,
    migration: impl Fixture + 'static,
    dataset: impl Fixture + 'static,
    context: impl Fixture + 'static,
) -> FixtureChain {
    FixtureChain::outer(database)
        .around(migration)
        .around(dataset)
        .around(context)
}
