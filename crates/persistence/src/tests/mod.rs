// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod database_tests;
mod migration_tests;

use std::path::PathBuf;
use std::sync::Arc;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

use dbfixture::TestIdentity;

use crate::{Changelog, DataSource, DatabaseSession, InMemoryDataSource, MigrationFixture};

/// Schema: `message`, `recipient`, the `delivery` view and a trigger.
pub const SCHEMA: EmbeddedMigrations = embed_migrations!("fixtures/migrations");

/// Seeds one `message` row.
pub const SEED: EmbeddedMigrations = embed_migrations!("fixtures/test_migrations");

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

#[derive(QueryableByName, Debug, PartialEq, Eq)]
pub struct MessageRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub text: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub author: Option<String>,
    #[diesel(sql_type = BigInt)]
    pub delivered: i64,
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Also installs the test tracing subscriber, so `RUST_LOG` applies.
pub fn identity(method: &str) -> TestIdentity {
    dbfixture::logging::init_test_tracing();
    TestIdentity::new("dbfixture_persistence::tests", method)
}

pub fn source() -> Arc<dyn DataSource> {
    Arc::new(InMemoryDataSource::default())
}

pub fn open(identity: &TestIdentity) -> DatabaseSession {
    InMemoryDataSource::default()
        .connect(Some(identity))
        .expect("open in-memory session")
}

pub fn schema_fixture(source: Arc<dyn DataSource>) -> MigrationFixture {
    MigrationFixture::new(source)
        .with_changelog(Changelog::embedded("schema", SCHEMA))
        .with_changelog(Changelog::embedded("seed", SEED))
}

/// Opens a session and applies the schema (without the seed).
pub fn open_migrated(identity: &TestIdentity) -> DatabaseSession {
    let mut session = open(identity);
    MigrationFixture::new(source())
        .with_changelog(Changelog::embedded("schema", SCHEMA))
        .apply(session.connection_mut().unwrap())
        .expect("apply schema");
    session
}

pub fn execute(session: &mut DatabaseSession, sql: &str) {
    diesel::sql_query(sql)
        .execute(session.connection_mut().unwrap())
        .unwrap_or_else(|e| panic!("{sql}: {e}"));
}

pub fn count(session: &mut DatabaseSession, table: &str) -> i64 {
    let row: CountRow = diesel::sql_query(format!("SELECT COUNT(*) AS n FROM \"{table}\""))
        .get_result(session.connection_mut().unwrap())
        .unwrap();
    row.n
}

pub fn count_on(conn: &mut SqliteConnection, table: &str) -> i64 {
    let row: CountRow = diesel::sql_query(format!("SELECT COUNT(*) AS n FROM \"{table}\""))
        .get_result(conn)
        .unwrap();
    row.n
}

pub fn user_objects(session: &mut DatabaseSession) -> i64 {
    let row: CountRow = diesel::sql_query(
        "SELECT COUNT(*) AS n FROM sqlite_master WHERE name NOT LIKE 'sqlite_%'",
    )
    .get_result(session.connection_mut().unwrap())
    .unwrap();
    row.n
}

pub fn messages(session: &mut DatabaseSession) -> Vec<MessageRow> {
    diesel::sql_query("SELECT id, text, author, delivered FROM message ORDER BY id")
        .load(session.connection_mut().unwrap())
        .unwrap()
}
