// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Test identity, connection naming and fixture composition.
//!
//! This crate holds the database-agnostic half of `dbfixture`:
//!
//! - [`TestIdentity`]: which test is running, passed explicitly to fixtures
//! - [`ConnectionNaming`]: thread-private, deterministic in-memory database names
//! - [`Fixture`] and [`FixtureChain`]: ordered setup and reverse-ordered teardown
//! - [`FixtureError`]: the error taxonomy shared by every fixture
//!
//! The `SQLite` lifecycle, archive and collaborator fixtures live in
//! `dbfixture-persistence`.

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

mod error;
mod fixture;
mod identity;
pub mod logging;
pub mod naming;

#[cfg(test)]
mod tests;

pub use error::{ChainError, FixtureError, Phase};
pub use fixture::{Fixture, FixtureChain, SharedFixture};
pub use identity::TestIdentity;
pub use naming::{ConnectionName, ConnectionNaming};
