// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Fixture, FixtureError, TestIdentity};

/// Shared log of fixture phase invocations.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn new_journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// A fixture that records every phase it runs and can be told to fail.
pub struct Probe {
    pub name: String,
    pub journal: Journal,
    pub fail_before: bool,
    pub fail_after: bool,
    pub panic_before: bool,
    pub panic_after: bool,
    pub seen: Vec<String>,
}

impl Probe {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: Arc::clone(journal),
            fail_before: false,
            fail_after: false,
            panic_before: false,
            panic_after: false,
            seen: Vec::new(),
        }
    }

    pub fn failing_before(mut self) -> Self {
        self.fail_before = true;
        self
    }

    pub fn failing_after(mut self) -> Self {
        self.fail_after = true;
        self
    }

    pub fn panicking_before(mut self) -> Self {
        self.panic_before = true;
        self
    }

    pub fn panicking_after(mut self) -> Self {
        self.panic_after = true;
        self
    }
}

impl Fixture for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        self.journal.lock().push(format!("before:{}", self.name));
        self.seen.push(identity.display_name());
        if self.panic_before {
            panic!("{} exploded in before", self.name);
        }
        if self.fail_before {
            return Err(FixtureError::ConnectionState(format!("{} refused", self.name)));
        }
        Ok(())
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        self.journal.lock().push(format!("after:{}", self.name));
        self.seen.push(identity.display_name());
        if self.panic_after {
            panic!("{} exploded in after", self.name);
        }
        if self.fail_after {
            return Err(FixtureError::InvalidState(format!("{} stuck", self.name)));
        }
        Ok(())
    }
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().clone()
}
