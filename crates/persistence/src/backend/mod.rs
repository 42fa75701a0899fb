// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Database backend-specific code.
//!
//! This module isolates the `SQLite` statements that cannot be expressed in
//! Diesel DSL: establishing fixture connections, the liveness probe,
//! capturing a database as a script, replaying it, and resetting an
//! in-memory instance on teardown.
//!
//! Fixtures and the archive call into this module; nothing else issues
//! raw SQL.

pub mod sqlite;
