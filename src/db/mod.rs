//! SQLite-backed arm state store.
//!
//! The database lives at `~/.recobandit/recobandit.db` unless the config
//! names another path. Every update runs in its own `BEGIN IMMEDIATE`
//! transaction, so a read-modify-write for one arm is serialized against
//! every other writer and either commits whole or not at all. Reads
//! (sampling an existing arm, statistics) take no write lock, and WAL mode
//! keeps them from waiting on writers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::types::Config;

pub mod arms;
pub mod types;
pub use types::*;

/// Idle connections kept for reuse when no config is given.
pub const DEFAULT_POOL_SIZE: usize = 4;
/// How long a writer waits for the SQLite write lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

pub struct ArmDb {
    path: PathBuf,
    /// Idle connections. Checked out for the duration of one operation.
    pool: Mutex<Vec<Connection>>,
    max_idle: usize,
    busy_timeout: Duration,
}

impl std::fmt::Debug for ArmDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmDb")
            .field("path", &self.path)
            .field("max_idle", &self.max_idle)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

impl ArmDb {
    /// Open (or create) the database named by `config` and apply the schema.
    pub fn open(config: &Config) -> Result<Self, DbError> {
        let path = match &config.db_path {
            Some(path) => path.clone(),
            None => Self::db_path()?,
        };
        Self::open_with(path, config.pool_size, config.busy_timeout())
    }

    /// Open a database at an explicit path with default pool settings.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        Self::open_with(path, DEFAULT_POOL_SIZE, DEFAULT_BUSY_TIMEOUT)
    }

    fn open_with(path: PathBuf, pool_size: usize, busy_timeout: Duration) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Self::connect(&path, busy_timeout)?;
        crate::migrations::run_migrations(&conn)?;

        log::info!("Opened arm store at {}", path.display());

        Ok(Self {
            path,
            pool: Mutex::new(vec![conn]),
            max_idle: pool_size.max(1),
            busy_timeout,
        })
    }

    fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // Enable WAL mode so readers never block on the writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(conn)
    }

    /// Resolve the default database path: `~/.recobandit/recobandit.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".recobandit").join("recobandit.db"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a pooled connection, opening a new one if none is idle.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError>,
    {
        let idle = self.pool.lock().pop();
        let mut conn = match idle {
            Some(conn) => conn,
            None => Self::connect(&self.path, self.busy_timeout)?,
        };

        let result = f(&mut conn);

        let mut pool = self.pool.lock();
        if pool.len() < self.max_idle {
            pool.push(conn);
        }
        result
    }

    /// Execute a closure within an immediate (write-locked) transaction.
    /// Commits on Ok; dropping the transaction on Err rolls it back.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Hot copy of the live database to `dest` via the online backup API.
    pub fn backup_to(&self, dest: &Path) -> Result<PathBuf, DbError> {
        self.with_conn(|conn| {
            let mut backup_conn = Connection::open(dest)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)?;
            // Copy all pages in one step (one row per item, stays small)
            backup.step(-1)?;
            Ok(())
        })?;

        log::info!("Arm store backed up to {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================
