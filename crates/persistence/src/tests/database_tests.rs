// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use dbfixture::{Fixture, FixtureError};

use crate::archive::Archive;
use crate::{DatabaseFixture, LifecycleState, PersistenceError};

use super::{count, count_on, execute, identity, open, schema_fixture, user_objects};

#[test]
fn test_before_on_empty_archive_connects() {
    let id = identity("test_before_on_empty_archive_connects");
    let mut database = DatabaseFixture::new();
    assert_eq!(database.state(), LifecycleState::Uninitialized);

    database.before(&id).unwrap();
    assert_eq!(database.state(), LifecycleState::Connected);
    assert!(database.session_mut().unwrap().is_valid());

    database.after(&id).unwrap();
    assert_eq!(database.state(), LifecycleState::TornDown);
    assert!(database.session_mut().is_none());
}

#[test]
fn test_first_teardown_captures_and_next_setup_restores() {
    let archive = Arc::new(Archive::new());

    let first = identity("capture_first");
    let mut database = DatabaseFixture::new().with_archive(Arc::clone(&archive));
    let mut migration = schema_fixture(database.data_source());
    database.before(&first).unwrap();
    migration.before(&first).unwrap();
    assert_eq!(migration.last_applied(), Some(true));
    migration.after(&first).unwrap();
    database.after(&first).unwrap();
    assert!(!archive.is_empty());

    let second = identity("capture_second");
    let mut database = DatabaseFixture::new().with_archive(Arc::clone(&archive));
    let mut migration = schema_fixture(database.data_source());
    database.before(&second).unwrap();
    assert_eq!(database.state(), LifecycleState::Restored);
    migration.before(&second).unwrap();
    assert_eq!(migration.last_applied(), Some(false));

    let session = database.session_mut().unwrap();
    assert_eq!(count(session, "message"), 1, "seed row restored");
    database.after(&second).unwrap();
}

#[test]
fn test_after_resets_the_in_memory_instance() {
    let id = identity("test_after_resets_the_in_memory_instance");
    let mut database = DatabaseFixture::new().without_archive();
    database.before(&id).unwrap();
    execute(
        database.session_mut().unwrap(),
        "CREATE TABLE leftover (x INTEGER)",
    );

    // Keeps the shared-cache database alive past teardown.
    let mut observer = open(&id);
    assert_eq!(user_objects(&mut observer), 1);

    database.after(&id).unwrap();
    assert_eq!(user_objects(&mut observer), 0);
}

#[test]
fn test_without_archive_never_captures() {
    let id = identity("test_without_archive_never_captures");
    let mut database = DatabaseFixture::new().without_archive();
    assert!(database.archive().is_none());

    database.before(&id).unwrap();
    assert_eq!(database.state(), LifecycleState::Connected);
    database.after(&id).unwrap();
    assert_eq!(database.state(), LifecycleState::TornDown);
}

#[test]
fn test_configure_hook_runs_on_lifecycle_connection() {
    let id = identity("test_configure_hook_runs");
    let mut database = DatabaseFixture::new().with_configure(|conn| {
        use diesel::RunQueryDsl;
        diesel::sql_query("CREATE TABLE configured (x INTEGER)").execute(conn)?;
        Ok(())
    });

    database.before(&id).unwrap();
    let conn = database.session_mut().unwrap().connection_mut().unwrap();
    assert_eq!(count_on(conn, "configured"), 0);
    database.after(&id).unwrap();
}

#[test]
fn test_failing_configure_hook_fails_setup() {
    let id = identity("test_failing_configure_hook_fails_setup");
    let mut database = DatabaseFixture::new().with_configure(|_| {
        Err(PersistenceError::ConfigurationError(String::from("nope")))
    });

    let err = database.before(&id).unwrap_err();
    assert!(matches!(err, FixtureError::Configuration(_)));
    assert!(database.session_mut().is_none());
    assert_eq!(database.state(), LifecycleState::Uninitialized);
}

#[test]
fn test_capture_failure_is_reported_after_shutdown() {
    let id = identity("test_capture_failure_is_reported_after_shutdown");
    let archive = Arc::new(Archive::new());
    let mut database = DatabaseFixture::new().with_archive(Arc::clone(&archive));
    database.before(&id).unwrap();
    database.session_mut().unwrap().close();

    let err = database.after(&id).unwrap_err();
    assert!(matches!(err, FixtureError::InvalidState(_)));
    assert_eq!(database.state(), LifecycleState::TornDown);
    assert!(archive.is_empty());
}

#[test]
fn test_after_without_before_is_harmless() {
    let id = identity("test_after_without_before_is_harmless");
    let mut database = DatabaseFixture::new();
    database.after(&id).unwrap();
    assert_eq!(database.state(), LifecycleState::TornDown);
}

#[test]
fn test_connection_name_includes_identity() {
    let id = identity("test_connection_name_includes_identity");
    let database = DatabaseFixture::new();
    let name = database.connection_name(&id);
    assert!(
        name.url().starts_with(
            "file:test_connection_name_includes_identity%28dbfixture_persistence%3A%3Atests%29-pid="
        )
    );
    assert_eq!(database.name(), "database");
}
