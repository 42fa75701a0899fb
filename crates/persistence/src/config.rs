// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Environment configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `DBFIXTURE_RUN_MIGRATIONS` | `true` | Set to `false` to skip migrations entirely |
//! | `DBFIXTURE_DATASET_ROOT` | `datasets` | Root directory for dataset lookup |
//! | `DBFIXTURE_INIT_SQL` | unset | SQL executed on every new connection |
//! | `DBFIXTURE_FOREIGN_KEYS` | `true` | Enable `PRAGMA foreign_keys` |

use std::path::PathBuf;

use dbfixture::ConnectionNaming;

use crate::data_source::InMemoryDataSource;
use crate::error::PersistenceError;

pub const RUN_MIGRATIONS_VAR: &str = "DBFIXTURE_RUN_MIGRATIONS";
pub const DATASET_ROOT_VAR: &str = "DBFIXTURE_DATASET_ROOT";
pub const INIT_SQL_VAR: &str = "DBFIXTURE_INIT_SQL";
pub const FOREIGN_KEYS_VAR: &str = "DBFIXTURE_FOREIGN_KEYS";

pub const DEFAULT_DATASET_ROOT: &str = "datasets";

/// Settings shared by the standard fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureConfig {
    pub run_migrations: bool,
    pub dataset_root: PathBuf,
    pub init_sql: Option<String>,
    pub foreign_keys: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            run_migrations: true,
            dataset_root: PathBuf::from(DEFAULT_DATASET_ROOT),
            init_sql: None,
            foreign_keys: true,
        }
    }
}

impl FixtureConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if a boolean variable holds anything
    /// other than `true`/`false`, `1`/`0`, `yes`/`no` or `on`/`off`.
    pub fn from_env() -> Result<Self, PersistenceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Unset and blank values
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// See [`FixtureConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PersistenceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();
        Ok(Self {
            run_migrations: match value(RUN_MIGRATIONS_VAR) {
                Some(v) => parse_bool(RUN_MIGRATIONS_VAR, &v)?,
                None => defaults.run_migrations,
            },
            dataset_root: value(DATASET_ROOT_VAR).map_or(defaults.dataset_root, PathBuf::from),
            init_sql: value(INIT_SQL_VAR),
            foreign_keys: match value(FOREIGN_KEYS_VAR) {
                Some(v) => parse_bool(FOREIGN_KEYS_VAR, &v)?,
                None => defaults.foreign_keys,
            },
        })
    }

    /// The naming scheme for the current process with this config's init SQL.
    #[must_use]
    pub fn naming(&self) -> ConnectionNaming {
        let naming = ConnectionNaming::new();
        match &self.init_sql {
            Some(sql) => naming.with_init_sql(sql.as_str()),
            None => naming,
        }
    }

    #[must_use]
    pub fn data_source(&self) -> InMemoryDataSource {
        InMemoryDataSource::new(self.naming()).with_foreign_keys(self.foreign_keys)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PersistenceError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(PersistenceError::ConfigurationError(format!(
            "{key} must be a boolean, got '{value}'"
        ))),
    }
}
