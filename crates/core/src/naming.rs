// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Connection naming scheme for thread-private in-memory databases.
//!
//! An unnamed in-memory `SQLite` database is private to the connection that
//! opened it. Fixtures need several connections (migration, dataset loading,
//! the persistence context) to reach the *same* database, so the database
//! is named and opened in shared-cache mode. The name must still be
//! private to the current thread and process:
//!
//! ```text
//! file:[TEST_NAME-][pid=PID-]thread=THREAD?mode=memory&cache=shared
//! ```
//!
//! Re-deriving the name on the same thread with the same identity always
//! yields the same URL, which is how independently constructed fixtures
//! find the database opened by the lifecycle fixture.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::identity::TestIdentity;

const URL_PREFIX: &str = "file:";
const SHARED_MEMORY_SUFFIX: &str = "?mode=memory&cache=shared";

/// Source of per-thread ordinals.
///
/// `ThreadId::as_u64` is not stable, so each thread is assigned the next
/// value of this counter the first time it derives a name.
static THREAD_COUNTER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ORDINAL: Cell<u64> = const { Cell::new(0) };
}

/// Returns the calling thread's ordinal. Stable for the thread's lifetime
/// and unique within the process.
#[must_use]
pub fn thread_ordinal() -> u64 {
    THREAD_ORDINAL.with(|ordinal| {
        if ordinal.get() == 0 {
            ordinal.set(THREAD_COUNTER.fetch_add(1, Ordering::SeqCst));
        }
        ordinal.get()
    })
}

/// A fully derived connection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionName {
    url: String,
    init_sql: Option<String>,
}

impl ConnectionName {
    /// The `SQLite` URI to open.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Initialization SQL to execute on every newly established connection.
    #[must_use]
    pub fn init_sql(&self) -> Option<&str> {
        self.init_sql.as_deref()
    }
}

impl fmt::Display for ConnectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        if let Some(sql) = &self.init_sql {
            write!(f, ";INIT={sql}")?;
        }
        Ok(())
    }
}

/// Derives [`ConnectionName`]s from process id, thread ordinal and an
/// optional test identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionNaming {
    process_id: Option<String>,
    init_sql: Option<String>,
}

impl Default for ConnectionNaming {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionNaming {
    /// Creates a naming scheme for the current process with no
    /// initialization SQL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            process_id: Some(std::process::id().to_string()),
            init_sql: None,
        }
    }

    /// Sets initialization SQL. Blank SQL is ignored.
    #[must_use]
    pub fn with_init_sql(mut self, init_sql: impl Into<String>) -> Self {
        let sql = init_sql.into().trim().to_string();
        self.init_sql = if sql.is_empty() { None } else { Some(sql) };
        self
    }

    /// Overrides the process identifier. `None` (or a blank value) omits
    /// the `pid=` segment entirely, as happens when the process id cannot
    /// be determined.
    #[must_use]
    pub fn with_process_id(mut self, process_id: Option<String>) -> Self {
        self.process_id = process_id.filter(|pid| !pid.trim().is_empty());
        self
    }

    #[must_use]
    pub fn process_id(&self) -> Option<&str> {
        self.process_id.as_deref()
    }

    /// Derives the connection name for the calling thread.
    #[must_use]
    pub fn derive(&self, identity: Option<&TestIdentity>) -> ConnectionName {
        let mut url = String::from(URL_PREFIX);
        if let Some(identity) = identity {
            url.push_str(&sanitize(&identity.display_name()));
            url.push('-');
        }
        if let Some(pid) = &self.process_id {
            url.push_str("pid=");
            url.push_str(pid);
            url.push('-');
        }
        url.push_str("thread=");
        url.push_str(&thread_ordinal().to_string());
        url.push_str(SHARED_MEMORY_SUFFIX);

        let name = ConnectionName {
            url,
            init_sql: self.init_sql.clone(),
        };
        debug!("Derived connection name {}", name);
        name
    }
}

/// Percent-encodes everything but ASCII alphanumerics and `- _ . ~`.
///
/// The encoding is reversible, so distinct display names never share a
/// database name. `SQLite` decodes the escapes when it opens the URI.
fn sanitize(display_name: &str) -> String {
    urlencoding::encode(display_name).into_owned()
}
