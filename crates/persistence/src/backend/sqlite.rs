// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! SQLite-specific backend utilities.
//!
//! ## Script format
//!
//! [`dump_script`] produces a `.dump`-style script: each statement followed
//! by a newline, replayable with [`execute_script`]. Statements keep the
//! text `SQLite` stored for them, so a multi-line `CREATE` stays multi-line.
//!
//! ```text
//! BEGIN TRANSACTION;
//! PRAGMA defer_foreign_keys=ON;
//! CREATE TABLE ...;                 -- tables, in creation order
//! INSERT INTO "t"("a","b") VALUES(...);
//! DELETE FROM sqlite_sequence;      -- only when AUTOINCREMENT is used
//! INSERT INTO "sqlite_sequence"(...) VALUES(...);
//! CREATE INDEX / VIEW / TRIGGER ...;
//! COMMIT;
//! ```
//!
//! Triggers are created after the rows are inserted so replay does not
//! fire them. Virtual tables are not supported.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Nullable, Text};
use tracing::{debug, info};

use dbfixture::ConnectionName;

use crate::error::PersistenceError;

const SEQUENCE_TABLE: &str = "sqlite_sequence";

/// A row of `sqlite_master`.
///
/// This is a justified use of raw SQL as Diesel has no schema introspection DSL.
#[derive(QueryableByName)]
struct SchemaObject {
    #[diesel(sql_type = Text)]
    kind: String,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Nullable<Text>)]
    sql: Option<String>,
}

#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    name: String,
}

#[derive(QueryableByName)]
struct ScriptLine {
    #[diesel(sql_type = Text)]
    line: String,
}

#[derive(QueryableByName)]
struct AliveRow {
    #[diesel(sql_type = Integer)]
    alive: i32,
}

/// Quotes an identifier for use in generated SQL.
pub(crate) fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes a string literal for use in generated SQL.
pub(crate) fn quote_literal(literal: &str) -> String {
    format!("'{}'", literal.replace('\'', "''"))
}

/// Establishes a connection to the named database.
///
/// Foreign key enforcement is switched on when requested, and the name's
/// initialization SQL (if any) is executed.
///
/// # Errors
///
/// Returns an error if the connection cannot be opened or either
/// initialization step fails.
pub fn establish(
    name: &ConnectionName,
    foreign_keys: bool,
) -> Result<SqliteConnection, PersistenceError> {
    debug!("Opening SQLite connection to {}", name);

    let mut conn: SqliteConnection = SqliteConnection::establish(name.url())
        .map_err(|e| PersistenceError::DatabaseConnectionFailed(e.to_string()))?;

    if foreign_keys {
        // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
        diesel::sql_query("PRAGMA foreign_keys = ON")
            .execute(&mut conn)
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
    }

    if let Some(init_sql) = name.init_sql() {
        conn.batch_execute(init_sql)
            .map_err(|e| PersistenceError::QueryFailed(format!("init SQL: {e}")))?;
    }

    Ok(conn)
}

/// Runs a trivial query to prove the connection is usable.
///
/// # Errors
///
/// Returns `InvalidConnection` if the probe fails.
pub fn check_alive(conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
    let row: AliveRow = diesel::sql_query("SELECT 1 AS alive")
        .get_result(conn)
        .map_err(|e| PersistenceError::InvalidConnection(e.to_string()))?;
    if row.alive == 1 {
        Ok(())
    } else {
        Err(PersistenceError::InvalidConnection(format!(
            "liveness probe returned {}",
            row.alive
        )))
    }
}

fn schema_objects(conn: &mut SqliteConnection) -> Result<Vec<SchemaObject>, PersistenceError> {
    Ok(
        diesel::sql_query("SELECT type AS kind, name, sql FROM sqlite_master ORDER BY rowid")
            .load::<SchemaObject>(conn)?,
    )
}

/// Renders every row of `table` as an `INSERT` statement.
///
/// The statements are built by `SQLite` itself with `quote()`, so every
/// value keeps its storage class.
fn table_rows(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>, PersistenceError> {
    let columns: Vec<ColumnName> =
        diesel::sql_query("SELECT name FROM pragma_table_info(?) ORDER BY cid")
            .bind::<Text, _>(table)
            .load(conn)?;
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
    let values: Vec<String> = columns
        .iter()
        .map(|c| format!("quote({})", quote_identifier(&c.name)))
        .collect();
    let prefix = format!(
        "INSERT INTO {}({}) VALUES(",
        quote_identifier(table),
        column_list.join(",")
    );
    let query = format!(
        "SELECT {} || {} || ');' AS line FROM {}",
        quote_literal(&prefix),
        values.join(" || ',' || "),
        quote_identifier(table)
    );

    let lines: Vec<ScriptLine> = diesel::sql_query(query).load(conn)?;
    Ok(lines.into_iter().map(|l| l.line).collect())
}

/// Captures the schema and data reachable through `conn` as a script.
///
/// # Errors
///
/// Returns `SnapshotFailed` if any introspection or row query fails.
pub fn dump_script(conn: &mut SqliteConnection) -> Result<String, PersistenceError> {
    let snapshot_failed = |e: PersistenceError| PersistenceError::SnapshotFailed(e.to_string());

    let objects = schema_objects(conn).map_err(snapshot_failed)?;

    let mut tables: Vec<&SchemaObject> = Vec::new();
    let mut others: Vec<&SchemaObject> = Vec::new();
    let mut has_sequence = false;
    for object in &objects {
        if object.name == SEQUENCE_TABLE {
            has_sequence = true;
            continue;
        }
        if object.name.starts_with("sqlite_") || object.sql.is_none() {
            continue;
        }
        if object.kind == "table" {
            tables.push(object);
        } else {
            others.push(object);
        }
    }

    let mut lines: Vec<String> = vec![
        "BEGIN TRANSACTION;".to_string(),
        "PRAGMA defer_foreign_keys=ON;".to_string(),
    ];
    for table in &tables {
        if let Some(sql) = &table.sql {
            lines.push(format!("{sql};"));
        }
    }
    for table in &tables {
        lines.extend(table_rows(conn, &table.name).map_err(snapshot_failed)?);
    }
    if has_sequence {
        lines.push(format!("DELETE FROM {SEQUENCE_TABLE};"));
        lines.extend(table_rows(conn, SEQUENCE_TABLE).map_err(snapshot_failed)?);
    }
    for other in &others {
        if let Some(sql) = &other.sql {
            lines.push(format!("{sql};"));
        }
    }
    lines.push("COMMIT;".to_string());

    let mut script = String::new();
    for line in lines {
        script.push_str(&line);
        script.push('\n');
    }

    debug!(
        "Captured script with {} tables and {} other objects ({} bytes)",
        tables.len(),
        others.len(),
        script.len()
    );
    Ok(script)
}

/// Executes a captured script as a single batch.
///
/// If a statement fails the open transaction is rolled back so the
/// connection is left usable.
///
/// # Errors
///
/// Returns `RestoreFailed` if any statement fails.
pub fn execute_script(conn: &mut SqliteConnection, script: &str) -> Result<(), PersistenceError> {
    if let Err(e) = conn.batch_execute(script) {
        // The batch may have stopped inside BEGIN ... COMMIT.
        let _ = conn.batch_execute("ROLLBACK");
        return Err(PersistenceError::RestoreFailed(e.to_string()));
    }
    Ok(())
}

/// Drops every user object so nothing survives in the in-memory instance,
/// even if a connection leaked past teardown.
///
/// Returns the number of objects dropped.
///
/// # Errors
///
/// Returns an error if introspection or a `DROP` fails.
pub fn reset_database(conn: &mut SqliteConnection) -> Result<usize, PersistenceError> {
    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    conn.batch_execute("PRAGMA foreign_keys = OFF")
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

    let objects = schema_objects(conn)?;
    let mut dropped: usize = 0;
    for kind in ["view", "trigger", "table"] {
        for object in objects
            .iter()
            .filter(|o| o.kind == kind && !o.name.starts_with("sqlite_"))
        {
            let statement = format!(
                "DROP {} IF EXISTS {}",
                kind.to_uppercase(),
                quote_identifier(&object.name)
            );
            conn.batch_execute(&statement)
                .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
            dropped += 1;
        }
    }

    info!("Reset in-memory database ({} objects dropped)", dropped);
    Ok(dropped)
}
