// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Dataset fixture.
//!
//! A dataset is a JSON document listing rows to insert before a test:
//!
//! ```json
//! {
//!   "tables": [
//!     { "name": "message", "rows": [ { "id": 1, "text": "Hello" } ] }
//!   ]
//! }
//! ```
//!
//! Scalars bind with their natural `SQLite` type. Arrays and objects are
//! stored as JSON text. Datasets are found per test by
//! [`DirectoryDatasetLocator`]:
//!
//! ```text
//! <root>/<simple class name>/<method>.json
//! <root>/<simple class name>.json
//! ```
//!
//! A test with no dataset file runs against an empty dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use diesel::SqliteConnection;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use dbfixture::{Fixture, FixtureError, TestIdentity};

use crate::backend::sqlite::quote_identifier;
use crate::config::FixtureConfig;
use crate::data_source::DataSource;
use crate::error::PersistenceError;

pub type DatasetRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetTable {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<DatasetRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub tables: Vec<DatasetTable>,
}

impl Dataset {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses and validates a dataset document.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` for malformed JSON and `DatasetInvalid`
    /// for a table without a name.
    pub fn from_json_str(json: &str) -> Result<Self, PersistenceError> {
        let dataset: Self = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Reads a dataset file.
    ///
    /// # Errors
    ///
    /// Returns `DatasetReadFailed` if the file cannot be read, otherwise as
    /// [`Dataset::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::DatasetReadFailed(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&json).map_err(|e| match e {
            PersistenceError::SerializationError(msg) => {
                PersistenceError::SerializationError(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    fn validate(&self) -> Result<(), PersistenceError> {
        if let Some(index) = self.tables.iter().position(|t| t.name.trim().is_empty()) {
            return Err(PersistenceError::DatasetInvalid(format!(
                "table #{index} has no name"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }

    /// Inserts every row, table by table in document order.
    ///
    /// The inserts run in one transaction. If any row fails, none of the
    /// dataset's rows remain.
    ///
    /// # Errors
    ///
    /// Returns `DatasetInvalid` naming the table if an insert fails.
    pub fn load(&self, conn: &mut SqliteConnection) -> Result<usize, PersistenceError> {
        conn.transaction::<_, PersistenceError, _>(|conn| {
            let mut inserted: usize = 0;
            for table in &self.tables {
                for row in &table.rows {
                    insert_row(conn, &table.name, row).map_err(|e| {
                        PersistenceError::DatasetInvalid(format!("insert into {}: {e}", table.name))
                    })?;
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    /// Deletes the rows this dataset inserted, in reverse table order.
    ///
    /// Returns the number of rows deleted. Rows without columns cannot be
    /// matched and are left in place.
    ///
    /// # Errors
    ///
    /// Returns `DatasetInvalid` naming the table if a delete fails.
    pub fn unload(&self, conn: &mut SqliteConnection) -> Result<usize, PersistenceError> {
        let mut deleted: usize = 0;
        for table in self.tables.iter().rev() {
            for row in table.rows.iter().rev() {
                if row.is_empty() {
                    continue;
                }
                deleted += delete_row(conn, &table.name, row).map_err(|e| {
                    PersistenceError::DatasetInvalid(format!("delete from {}: {e}", table.name))
                })?;
            }
        }
        Ok(deleted)
    }
}

fn bind_value<'f>(
    query: BoxedSqlQuery<'f, Sqlite, SqlQuery>,
    value: &Value,
) -> Result<BoxedSqlQuery<'f, Sqlite, SqlQuery>, PersistenceError> {
    let query = match value {
        Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        Value::Bool(b) => query.bind::<Bool, _>(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind::<BigInt, _>(i)
            } else if n.is_f64() {
                query.bind::<Double, _>(n.as_f64().unwrap_or(f64::NAN))
            } else {
                // SQLite integers are signed 64-bit.
                return Err(PersistenceError::DatasetInvalid(format!(
                    "integer {n} is out of range"
                )));
            }
        }
        Value::String(s) => query.bind::<Text, _>(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind::<Text, _>(value.to_string()),
    };
    Ok(query)
}

fn insert_row(
    conn: &mut SqliteConnection,
    table: &str,
    row: &DatasetRow,
) -> Result<(), PersistenceError> {
    let sql = if row.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
    } else {
        let columns: Vec<String> = row.keys().map(|c| quote_identifier(c)).collect();
        let placeholders: Vec<&str> = row.keys().map(|_| "?").collect();
        format!(
            "INSERT INTO {}({}) VALUES({})",
            quote_identifier(table),
            columns.join(","),
            placeholders.join(",")
        )
    };

    let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
    for value in row.values() {
        query = bind_value(query, value)?;
    }
    query.execute(conn)?;
    Ok(())
}

fn delete_row(
    conn: &mut SqliteConnection,
    table: &str,
    row: &DatasetRow,
) -> Result<usize, PersistenceError> {
    let conditions: Vec<String> = row
        .keys()
        .map(|c| format!("{} IS ?", quote_identifier(c)))
        .collect();
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_identifier(table),
        conditions.join(" AND ")
    );

    let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
    for value in row.values() {
        query = bind_value(query, value)?;
    }
    Ok(query.execute(conn)?)
}

/// Finds the dataset for a test.
pub trait DatasetLocator: Send + Sync {
    /// Returns the test's dataset, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if a dataset exists but cannot be read or parsed.
    fn locate(&self, identity: &TestIdentity) -> Result<Option<Dataset>, PersistenceError>;
}

/// Looks datasets up as JSON files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryDatasetLocator {
    root: PathBuf,
}

impl DirectoryDatasetLocator {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Candidate files for `identity`, most specific first.
    #[must_use]
    pub fn candidates(&self, identity: &TestIdentity) -> Vec<PathBuf> {
        let class = identity.simple_class_name();
        let mut candidates = Vec::with_capacity(2);
        if let Some(method) = identity.method_name() {
            candidates.push(self.root.join(class).join(format!("{method}.json")));
        }
        candidates.push(self.root.join(format!("{class}.json")));
        candidates
    }
}

impl DatasetLocator for DirectoryDatasetLocator {
    fn locate(&self, identity: &TestIdentity) -> Result<Option<Dataset>, PersistenceError> {
        for candidate in self.candidates(identity) {
            if candidate.is_file() {
                debug!("Using dataset {} for {}", candidate.display(), identity);
                return Dataset::from_path(&candidate).map(Some);
            }
        }
        Ok(None)
    }
}

/// Loads the test's dataset on `before` and removes it on `after`.
pub struct DatasetFixture {
    source: Arc<dyn DataSource>,
    locator: Box<dyn DatasetLocator>,
    fixed: Option<Dataset>,
    active: Option<Dataset>,
}

impl DatasetFixture {
    /// Creates a fixture looking datasets up under `datasets`.
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::with_config(source, &FixtureConfig::default())
    }

    /// Creates a fixture looking datasets up under the configured root.
    #[must_use]
    pub fn with_config(source: Arc<dyn DataSource>, config: &FixtureConfig) -> Self {
        Self {
            source,
            locator: Box::new(DirectoryDatasetLocator::new(config.dataset_root.clone())),
            fixed: None,
            active: None,
        }
    }

    #[must_use]
    pub fn with_locator(mut self, locator: impl DatasetLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// Uses `dataset` for every test instead of looking one up.
    #[must_use]
    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.fixed = Some(dataset);
        self
    }

    /// The dataset loaded for the running test.
    #[must_use]
    pub const fn active(&self) -> Option<&Dataset> {
        self.active.as_ref()
    }

    fn resolve(&self, identity: &TestIdentity) -> Result<Dataset, PersistenceError> {
        if let Some(dataset) = &self.fixed {
            return Ok(dataset.clone());
        }
        Ok(self.locator.locate(identity)?.unwrap_or_default())
    }
}

impl Fixture for DatasetFixture {
    fn name(&self) -> &str {
        "dataset"
    }

    fn before(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        let dataset = self.resolve(identity)?;

        if !dataset.is_empty() {
            let mut session = self.source.connect(Some(identity))?;
            let result = dataset.load(session.connection_mut()?);
            session.close();
            let inserted = result?;
            info!("Loaded {} dataset rows for {}", inserted, identity);
        }

        self.active = Some(dataset);
        Ok(())
    }

    fn after(&mut self, identity: &TestIdentity) -> Result<(), FixtureError> {
        let Some(dataset) = self.active.take() else {
            return Ok(());
        };
        if dataset.is_empty() {
            return Ok(());
        }

        let mut session = self.source.connect(Some(identity))?;
        let result = dataset.unload(session.connection_mut()?);
        session.close();
        let deleted = result?;
        debug!("Removed {} dataset rows for {}", deleted, identity);
        Ok(())
    }
}
