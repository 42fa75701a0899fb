// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Fixture composition.
//!
//! A fixture is a scoped acquisition with symmetric `before` and `after`
//! operations. A [`FixtureChain`] runs `before` outer-to-inner, then the
//! test body, then `after` inner-to-outer. The usual database chain is:
//!
//! ```text
//! database -> migration -> dataset -> persistence context -> body
//! ```
//!
//! so that the database is open and migrated when datasets are loaded, and
//! the persistence context and dataset are released before the database
//! connection is closed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error};

use crate::error::{ChainError, FixtureError, Phase};
use crate::identity::TestIdentity;

/// A scoped resource wrapped around a test.
///
/// The current test's identity is passed to both phases. Implementations
/// must not retain it past `after`.
pub trait Fixture: Send {
    /// A short name used in logs and in [`ChainError::fixture`].
    fn name(&self) -> &str;

    /// Acquires the resource.
    ///
    /// A fixture whose `before` fails is responsible for releasing whatever
    /// it partially acquired; its `after` is not called.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be acquired. The test body
    /// is then skipped.
    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError>;

    /// Releases the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing failed. Remaining fixtures are still
    /// torn down.
    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError>;
}

impl<F: Fixture + ?Sized> Fixture for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        (**self).before(identity)
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        (**self).after(identity)
    }
}

/// A cloneable handle to a fixture.
///
/// Placing a clone in a chain lets the test keep inspecting the fixture
/// (for example, whether migrations ran) after the chain owns it.
pub struct SharedFixture<F> {
    name: String,
    inner: Arc<Mutex<F>>,
}

impl<F: Fixture> SharedFixture<F> {
    #[must_use]
    pub fn new(fixture: F) -> Self {
        Self {
            name: fixture.name().to_string(),
            inner: Arc::new(Mutex::new(fixture)),
        }
    }

    /// Locks the fixture for inspection.
    pub fn lock(&self) -> MutexGuard<'_, F> {
        self.inner.lock()
    }
}

impl<F> Clone for SharedFixture<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Fixture> Fixture for SharedFixture<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        self.inner.lock().before(identity)
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        self.inner.lock().after(identity)
    }
}

/// An ordered list of fixtures, outermost first.
#[derive(Default)]
pub struct FixtureChain {
    fixtures: Vec<Box<dyn Fixture>>,
}

impl FixtureChain {
    /// Starts a chain with its outermost fixture.
    #[must_use]
    pub fn outer(fixture: impl Fixture + 'static) -> Self {
        Self {
            fixtures: vec![Box::new(fixture)],
        }
    }

    /// Adds a fixture nested inside every fixture added so far.
    #[must_use]
    pub fn around(mut self, fixture: impl Fixture + 'static) -> Self {
        self.fixtures.push(Box::new(fixture));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Fixture names, outermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fixtures.iter().map(|f| f.name()).collect()
    }

    /// Runs `body` inside every fixture.
    ///
    /// If a `before` fails, the body is skipped and only the fixtures
    /// already entered are torn down. A panic in the body or in any
    /// fixture phase still tears down every fixture already entered, and
    /// the first panic is then resumed; teardown failures are logged.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] if any setup or teardown step failed.
    pub fn run<T>(
        &mut self,
        identity: &TestIdentity,
        body: impl FnOnce() -> T,
    ) -> Result<T, ChainError> {
        let mut entered: usize = 0;
        let mut setup_failure: Option<(String, FixtureError)> = None;
        let mut setup_panic: Option<PanicPayload> = None;

        for fixture in &mut self.fixtures {
            debug!("before {} for {}", fixture.name(), identity);
            match panic::catch_unwind(AssertUnwindSafe(|| fixture.before(identity))) {
                Ok(Ok(())) => entered += 1,
                Ok(Err(err)) => {
                    setup_failure = Some((fixture.name().to_string(), err));
                    break;
                }
                Err(payload) => {
                    error!("{} setup panicked", fixture.name());
                    setup_panic = Some(payload);
                    break;
                }
            }
        }

        if let Some(payload) = setup_panic {
            let teardown = self.teardown(identity, entered);
            teardown.log_after_panic();
            panic::resume_unwind(payload);
        }

        if let Some((fixture, err)) = setup_failure {
            let teardown = self.teardown(identity, entered);
            if let Some(payload) = teardown.panic {
                panic::resume_unwind(payload);
            }
            return Err(ChainError {
                phase: Phase::Setup,
                fixture,
                error: err,
                suppressed: teardown.failures.into_iter().map(|(_, e)| e).collect(),
            });
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        let mut teardown = self.teardown(identity, entered);

        match outcome {
            Err(payload) => {
                teardown.log_after_panic();
                panic::resume_unwind(payload)
            }
            Ok(value) => {
                if let Some(payload) = teardown.panic {
                    panic::resume_unwind(payload);
                }
                if teardown.failures.is_empty() {
                    return Ok(value);
                }
                let (fixture, err) = teardown.failures.remove(0);
                Err(ChainError {
                    phase: Phase::Teardown,
                    fixture,
                    error: err,
                    suppressed: teardown.failures.into_iter().map(|(_, e)| e).collect(),
                })
            }
        }
    }

    /// Tears down the first `entered` fixtures in reverse order, continuing
    /// past failures and panics.
    fn teardown(&mut self, identity: &TestIdentity, entered: usize) -> Teardown {
        let mut teardown = Teardown::default();
        for fixture in self.fixtures[..entered].iter_mut().rev() {
            debug!("after {} for {}", fixture.name(), identity);
            match panic::catch_unwind(AssertUnwindSafe(|| fixture.after(identity))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("{} teardown failed: {err}", fixture.name());
                    teardown.failures.push((fixture.name().to_string(), err));
                }
                Err(payload) => {
                    error!("{} teardown panicked", fixture.name());
                    if teardown.panic.is_none() {
                        teardown.panic = Some(payload);
                    }
                }
            }
        }
        teardown
    }
}

type PanicPayload = Box<dyn Any + Send + 'static>;

/// What went wrong while tearing a chain down.
#[derive(Default)]
struct Teardown {
    failures: Vec<(String, FixtureError)>,
    panic: Option<PanicPayload>,
}

impl Teardown {
    /// Logs teardown failures that an earlier panic will hide.
    fn log_after_panic(&self) {
        for (fixture, err) in &self.failures {
            error!("{fixture} teardown failed after panic: {err}");
        }
    }
}
