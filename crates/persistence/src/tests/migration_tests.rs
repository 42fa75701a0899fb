// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fs;

use dbfixture::{Fixture, FixtureError};

use crate::{Changelog, DatabaseFixture, FixtureConfig, MigrationFixture, PersistenceError};

use super::{SCHEMA, SEED, count, fixtures_dir, identity, open, schema_fixture, source, user_objects};

#[test]
fn test_apply_runs_only_pending_migrations() {
    let mut session = open(&identity("test_apply_runs_only_pending_migrations"));
    let migration = schema_fixture(source());

    assert!(migration.apply(session.connection_mut().unwrap()).unwrap());
    assert_eq!(count(&mut session, "message"), 1);

    assert!(!migration.apply(session.connection_mut().unwrap()).unwrap());
    assert_eq!(count(&mut session, "message"), 1, "seed not applied twice");
}

#[test]
fn test_before_records_whether_migrations_ran() {
    let id = identity("test_before_records_whether_migrations_ran");
    let mut database = DatabaseFixture::new().without_archive();
    let mut migration = schema_fixture(database.data_source());
    assert_eq!(migration.last_applied(), None);

    database.before(&id).unwrap();
    migration.before(&id).unwrap();
    assert_eq!(migration.last_applied(), Some(true));
    migration.before(&id).unwrap();
    assert_eq!(migration.last_applied(), Some(false));

    migration.after(&id).unwrap();
    database.after(&id).unwrap();
}

#[test]
fn test_disabled_migration_fixture_does_nothing() {
    let id = identity("test_disabled_migration_fixture_does_nothing");
    let mut database = DatabaseFixture::new().without_archive();
    let mut migration = schema_fixture(database.data_source()).enabled(false);
    assert!(!migration.is_enabled());

    database.before(&id).unwrap();
    migration.before(&id).unwrap();
    assert_eq!(migration.last_applied(), None);
    assert_eq!(user_objects(database.session_mut().unwrap()), 0);
    database.after(&id).unwrap();
}

#[test]
fn test_run_migrations_switch_comes_from_config() {
    let config = FixtureConfig::from_lookup(|key| {
        (key == "DBFIXTURE_RUN_MIGRATIONS").then(|| String::from("false"))
    })
    .unwrap();
    let migration = schema_fixture(source()).with_config(&config);
    assert!(!migration.is_enabled());
}

#[test]
fn test_changelog_contexts_filter_what_runs() {
    let tagged = || {
        MigrationFixture::new(source())
            .with_changelog(Changelog::embedded("schema", SCHEMA))
            .with_changelog(Changelog::embedded("seed", SEED).with_contexts(["test"]))
    };

    let mut production = open(&identity("contexts_production"));
    tagged()
        .with_contexts(["production"])
        .apply(production.connection_mut().unwrap())
        .unwrap();
    assert_eq!(count(&mut production, "message"), 0);

    let mut testing = open(&identity("contexts_testing"));
    tagged()
        .with_contexts(["test"])
        .apply(testing.connection_mut().unwrap())
        .unwrap();
    assert_eq!(count(&mut testing, "message"), 1);

    let mut unrestricted = open(&identity("contexts_unrestricted"));
    tagged()
        .apply(unrestricted.connection_mut().unwrap())
        .unwrap();
    assert_eq!(count(&mut unrestricted, "message"), 1);
}

#[test]
fn test_default_locations_pick_up_existing_directories() {
    let migration = MigrationFixture::new(source())
        .with_default_locations(fixtures_dir())
        .unwrap();
    let labels: Vec<&str> = migration.changelogs().iter().map(Changelog::label).collect();
    assert_eq!(labels.len(), 2);
    assert!(labels[0].ends_with("migrations"));
    assert!(labels[1].ends_with("test_migrations"));

    let mut session = open(&identity("test_default_locations"));
    assert!(migration.apply(session.connection_mut().unwrap()).unwrap());
    assert_eq!(count(&mut session, "message"), 1);
}

#[test]
fn test_default_locations_skip_missing_directories() {
    let empty = tempfile::tempdir().unwrap();
    let migration = MigrationFixture::new(source())
        .with_default_locations(empty.path())
        .unwrap();
    assert!(migration.changelogs().is_empty());

    let mut session = open(&identity("test_default_locations_skip_missing"));
    assert!(!migration.apply(session.connection_mut().unwrap()).unwrap());
}

#[test]
fn test_directory_changelog_requires_existing_directory() {
    let missing = fixtures_dir().join("no_such_migrations");
    assert!(matches!(
        Changelog::directory(missing),
        Err(PersistenceError::MigrationFailed(_))
    ));
}

#[test]
fn test_broken_migration_fails_with_migration_error() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("2020-01-01-000000_broken");
    fs::create_dir(&broken).unwrap();
    fs::write(broken.join("up.sql"), "CREATE TABLE (;").unwrap();
    fs::write(broken.join("down.sql"), "").unwrap();

    let id = identity("test_broken_migration_fails_with_migration_error");
    let mut database = DatabaseFixture::new().without_archive();
    let mut migration = MigrationFixture::new(database.data_source())
        .with_changelog(Changelog::directory(dir.path()).unwrap());

    database.before(&id).unwrap();
    let err = migration.before(&id).unwrap_err();
    assert!(matches!(err, FixtureError::Migration(_)), "{err}");
    assert_eq!(migration.last_applied(), None);
    database.after(&id).unwrap();
}

#[test]
fn test_fingerprint_tracks_migrations_and_contexts() {
    let full = schema_fixture(source()).fingerprint().unwrap();
    assert!(full.contains("create_message"));
    assert!(full.contains("seed_message"));

    let schema_only = MigrationFixture::new(source())
        .with_changelog(Changelog::embedded("schema", SCHEMA))
        .fingerprint()
        .unwrap();
    assert_ne!(full, schema_only);

    let with_contexts = schema_fixture(source())
        .with_contexts(["test"])
        .fingerprint()
        .unwrap();
    assert_ne!(full, with_contexts);

    assert_eq!(full, schema_fixture(source()).fingerprint().unwrap());
}
