//! Embedded schema migrations.
//!
//! Migrations are numbered SQL files compiled in with `include_str!` and
//! applied in order, each exactly once. Applied versions are tracked in
//! `schema_version`. A database stamped with a version this build does not
//! know is refused rather than touched.

use rusqlite::{params, Connection};

use crate::db::DbError;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/001_baseline.sql"),
}];

fn applied_version(conn: &Connection) -> Result<i64, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Hot copy to `<db_path>.pre-migration.bak` before altering a live schema.
/// No-op for in-memory databases.
fn backup_before_migration(conn: &Connection) -> Result<(), DbError> {
    let db_path: String = conn.query_row("PRAGMA database_list", [], |row| row.get(2))?;
    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    let backup_path = format!("{db_path}.pre-migration.bak");
    let mut backup_conn = Connection::open(&backup_path)?;
    rusqlite::backup::Backup::new(conn, &mut backup_conn)?.step(-1)?;

    log::info!("Pre-migration backup created at {backup_path}");
    Ok(())
}

/// Apply every pending migration. Returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, DbError> {
    let current = applied_version(conn)?;
    let latest = MIGRATIONS.last().map_or(0, |m| m.version);

    if current > latest {
        return Err(DbError::Migration(format!(
            "database schema v{current} is newer than the v{latest} this build supports; \
             upgrade recobandit"
        )));
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }

    // A brand-new file has nothing worth keeping.
    if current > 0 {
        backup_before_migration(conn)?;
    }

    for migration in &pending {
        conn.execute_batch(migration.sql)
            .map_err(|e| DbError::Migration(format!("v{} failed: {e}", migration.version)))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![migration.version],
        )?;
        log::info!("Applied migration v{}", migration.version);
    }

    Ok(pending.len())
}
