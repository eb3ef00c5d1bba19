/*
 *  Copyright 2026 Opifex Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database layer: runtime backend selection, pooling, schema and embedded
//! migrations.

use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod connection;
pub mod schema;

pub use connection::{AnyConnection, BackendType, Database, DbConn, DbManager, DbPool};

use crate::error::DataAccessError;

/// Embedded migrations for the PostgreSQL backend.
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Embedded migrations for the SQLite backend.
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs pending migrations on a direct PostgreSQL connection.
///
/// [`Database::run_migrations`] covers the pooled case; this exists for
/// callers that hold their own connection, such as test harnesses and
/// administrative tools.
pub fn run_migrations_postgres(conn: &mut PgConnection) -> Result<(), DataAccessError> {
    conn.run_pending_migrations(POSTGRES_MIGRATIONS)
        .map_err(|e| DataAccessError::Migration(e.to_string()))?;
    Ok(())
}

/// Runs pending migrations on a direct SQLite connection.
///
/// Applies the WAL and busy_timeout pragmas first, matching what the
/// pooled path does, so directly-opened databases behave the same.
pub fn run_migrations_sqlite(conn: &mut SqliteConnection) -> Result<(), DataAccessError> {
    // WAL mode allows concurrent reads during writes
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    // busy_timeout makes SQLite wait 30s instead of immediately failing
    // on locks
    diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;

    conn.run_pending_migrations(SQLITE_MIGRATIONS)
        .map_err(|e| DataAccessError::Migration(e.to_string()))?;
    Ok(())
}
