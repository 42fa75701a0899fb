// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Test identity.
//!
//! A `TestIdentity` names the test that is currently running. It is handed
//! to every fixture explicitly on `before` and `after` instead of being
//! stashed on the fixture ahead of time.

use std::fmt;

/// Identifies a single test: the owning "class" (a module path in Rust)
/// and, optionally, the test function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestIdentity {
    class_name: String,
    method_name: Option<String>,
}

impl TestIdentity {
    /// Creates an identity for a test method within a test class.
    #[must_use]
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: Some(method_name.into()),
        }
    }

    /// Creates an identity that names only a test class.
    #[must_use]
    pub fn for_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: None,
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    /// Returns the last `::`-separated segment of the class name.
    ///
    /// `crate::tests::message_tests` becomes `message_tests`. Dataset
    /// lookup is keyed by this value.
    #[must_use]
    pub fn simple_class_name(&self) -> &str {
        self.class_name
            .rsplit("::")
            .next()
            .unwrap_or(self.class_name.as_str())
    }

    /// Returns `method(class)`, or just `class` if no method is known.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.method_name {
            Some(method) => format!("{method}({})", self.class_name),
            None => self.class_name.clone(),
        }
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Builds a [`TestIdentity`] whose class is the calling module's path.
///
/// ```
/// let identity = dbfixture::test_identity!("creates_message");
/// assert_eq!(identity.method_name(), Some("creates_message"));
/// ```
#[macro_export]
macro_rules! test_identity {
    ($method:expr) => {
        $crate::TestIdentity::new(module_path!(), $method)
    };
    () => {
        $crate::TestIdentity::for_class(module_path!())
    };
}
