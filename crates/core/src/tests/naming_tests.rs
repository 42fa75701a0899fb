// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use crate::naming::thread_ordinal;
use crate::{ConnectionNaming, TestIdentity};

#[test]
fn test_name_without_identity_has_pid_and_thread() {
    let naming = ConnectionNaming::new();
    let name = naming.derive(None);
    let expected = format!(
        "file:pid={}-thread={}?mode=memory&cache=shared",
        std::process::id(),
        thread_ordinal()
    );
    assert_eq!(name.url(), expected);
    assert_eq!(name.init_sql(), None);
}

#[test]
fn test_name_with_identity_prefixes_display_name() {
    let naming = ConnectionNaming::new().with_process_id(Some("42".to_string()));
    let identity = TestIdentity::new("message_tests", "first");
    let name = naming.derive(Some(&identity));
    assert_eq!(
        name.url(),
        format!(
            "file:first%28message_tests%29-pid=42-thread={}?mode=memory&cache=shared",
            thread_ordinal()
        )
    );
}

#[test]
fn test_missing_process_id_is_omitted() {
    let naming = ConnectionNaming::new().with_process_id(None);
    let name = naming.derive(None);
    assert_eq!(
        name.url(),
        format!("file:thread={}?mode=memory&cache=shared", thread_ordinal())
    );
    assert!(!name.url().contains("pid="));

    let blank = ConnectionNaming::new().with_process_id(Some("  ".to_string()));
    assert_eq!(blank.process_id(), None);
}

#[test]
fn test_unsafe_characters_are_percent_encoded() {
    let naming = ConnectionNaming::new().with_process_id(Some("1".to_string()));
    let identity = TestIdentity::new("app::tests", "what?#100%");
    let url = naming.derive(Some(&identity)).url().to_string();
    assert!(url.starts_with("file:what%3F%23100%25%28app%3A%3Atests%29-pid=1-thread="));
    assert_eq!(url.matches('?').count(), 1, "only the query separator remains");
}

#[test]
fn test_display_names_differing_in_unsafe_characters_stay_distinct() {
    let naming = ConnectionNaming::new();
    let spaced = naming.derive(Some(&TestIdentity::new("x", "a b")));
    let underscored = naming.derive(Some(&TestIdentity::new("x", "a_b")));
    assert_ne!(spaced.url(), underscored.url());
    assert!(spaced.url().starts_with("file:a%20b%28x%29-"));
}

#[test]
fn test_init_sql_is_trimmed_and_blank_ignored() {
    let naming = ConnectionNaming::new().with_init_sql("  CREATE TABLE IF NOT EXISTS t(x);  ");
    let name = naming.derive(None);
    assert_eq!(name.init_sql(), Some("CREATE TABLE IF NOT EXISTS t(x);"));
    assert!(name.to_string().ends_with(";INIT=CREATE TABLE IF NOT EXISTS t(x);"));

    let blank = ConnectionNaming::new().with_init_sql("   ");
    assert_eq!(blank.derive(None).init_sql(), None);
}

#[test]
fn test_derivation_is_deterministic_within_a_thread() {
    let naming = ConnectionNaming::new();
    let identity = TestIdentity::new("message_tests", "first");
    assert_eq!(naming.derive(Some(&identity)), naming.derive(Some(&identity)));
}

#[test]
fn test_sequential_tests_on_one_thread_get_distinct_names() {
    let naming = ConnectionNaming::new();
    let first = naming.derive(Some(&TestIdentity::new("message_tests", "first")));
    let second = naming.derive(Some(&TestIdentity::new("message_tests", "second")));
    assert_ne!(first, second);
}

#[test]
fn test_concurrent_threads_get_pairwise_distinct_names() {
    const THREADS: usize = 16;
    let naming = Arc::new(ConnectionNaming::new());
    let barrier = Arc::new(Barrier::new(THREADS));
    let identity = TestIdentity::new("message_tests", "same_test");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let naming = Arc::clone(&naming);
            let barrier = Arc::clone(&barrier);
            let identity = identity.clone();
            thread::spawn(move || {
                barrier.wait();
                naming.derive(Some(&identity)).url().to_string()
            })
        })
        .collect();

    let urls: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(urls.len(), THREADS);
}
